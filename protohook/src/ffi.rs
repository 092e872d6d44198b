//! C entry points spliced into hooked protocols.
//!
//! The native framework calls these with its own `UrlContext` and nothing
//! else, so they find the registry through a single attach slot. The
//! composition root attaches its registry once at startup and keeps the
//! returned `AttachGuard` alive for as long as hooks may fire:
//!
//! ```no_run
//! use std::sync::Arc;
//! use protohook::{ffi, FileHook, HookConfig, ProtocolRegistry};
//! # fn runtime() -> Arc<dyn protocol_runtime::ProtocolRuntime> { unimplemented!() }
//!
//! let registry = Arc::new(ProtocolRegistry::new(runtime(), HookConfig::default()));
//! let _attached = ffi::attach(Arc::clone(&registry));
//! registry.install("file", Arc::new(FileHook::new()));
//! // ... the framework now routes "file" I/O through the registry ...
//! registry.uninstall_all();
//! ```
//!
//! Every failure is reported as `STATUS_FAILURE`; the reason is logged.

use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use protocol_runtime::{CallbackTable, UrlContext, STATUS_FAILURE};
use tracing::{error, trace, warn};

use crate::config::BufferMode;
use crate::dispatch::StreamSlot;
use crate::error::HookError;
use crate::hook::{OpenFlags, SeekRequest};
use crate::marshal::{copy_c_string, count_to_status, offset_to_status, read_target, write_source};
use crate::registry::ProtocolRegistry;

/// The five entry points, ready to be spliced into a protocol.
pub const CALLBACKS: CallbackTable = CallbackTable {
    open: Some(protohook_open),
    close: Some(protohook_close),
    read: Some(protohook_read),
    write: Some(protohook_write),
    seek: Some(protohook_seek),
};

lazy_static! {
    static ref ATTACHED: RwLock<Option<Arc<ProtocolRegistry>>> = RwLock::new(None);
}

/// Keeps a registry attached; detaches it on drop.
#[must_use = "the registry is detached when the guard is dropped"]
pub struct AttachGuard {
    registry: Arc<ProtocolRegistry>,
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let mut slot = ATTACHED.write();
        // Only detach if nobody attached another registry in the meantime
        if slot.as_ref().is_some_and(|r| Arc::ptr_eq(r, &self.registry)) {
            *slot = None;
        }
    }
}

/// Make `registry` the one the entry points dispatch to.
pub fn attach(registry: Arc<ProtocolRegistry>) -> AttachGuard {
    let previous = ATTACHED.write().replace(Arc::clone(&registry));
    if previous.is_some() {
        warn!("replacing previously attached registry");
    }
    AttachGuard { registry }
}

/// Registry the entry points currently dispatch to.
pub fn attached() -> Option<Arc<ProtocolRegistry>> {
    ATTACHED.read().clone()
}

/// Marshal the common part of every call, run `f`, and contain panics.
///
/// # Safety
/// `ctx` is null or a valid, exclusively borrowed context for this call.
unsafe fn with_call<T>(
    op: &'static str,
    ctx: *mut UrlContext,
    f: impl FnOnce(&ProtocolRegistry, &str, &mut UrlContext) -> Result<T, HookError>,
) -> Result<T, HookError> {
    let ctx = unsafe { ctx.as_mut() }.ok_or_else(|| HookError::invalid("null context"))?;
    let protocol = unsafe { copy_c_string(ctx.protocol_name) }
        .ok_or_else(|| HookError::invalid("null protocol name"))?;
    let registry = attached().ok_or_else(|| HookError::ProtocolNotRegistered(protocol.clone()))?;

    trace!(op, protocol = %protocol, "native call");
    match catch_unwind(AssertUnwindSafe(|| f(registry.as_ref(), protocol.as_str(), ctx))) {
        Ok(result) => result,
        Err(_) => {
            error!(op, protocol = %protocol, "handler panicked");
            Err(HookError::invalid("handler panicked"))
        }
    }
}

fn report(op: &'static str, e: &HookError) {
    warn!(op, error = %e, "hook call failed");
}

/// Open entry point. Returns 0 or -1.
///
/// # Safety
/// Called by the native framework with a valid context and a NUL-terminated URL.
#[no_mangle]
pub unsafe extern "C" fn protohook_open(ctx: *mut UrlContext, url: *const c_char, flags: c_int) -> c_int {
    let result = unsafe {
        with_call("open", ctx, |registry, protocol, ctx| {
            let filename = copy_c_string(url).ok_or_else(|| HookError::invalid("null url"))?;
            let mut slot = StreamSlot::new(&mut ctx.host_stream);
            registry.dispatch_open(protocol, &mut slot, &filename, OpenFlags::from_raw(flags))
        })
    };
    match result {
        Ok(_) => 0,
        Err(e) => {
            report("open", &e);
            STATUS_FAILURE
        }
    }
}

/// Close entry point. Returns 0 or -1.
///
/// # Safety
/// Called by the native framework with a valid context.
#[no_mangle]
pub unsafe extern "C" fn protohook_close(ctx: *mut UrlContext) -> c_int {
    let result = unsafe {
        with_call("close", ctx, |registry, protocol, ctx| {
            let mut slot = StreamSlot::new(&mut ctx.host_stream);
            registry.dispatch_close(protocol, &mut slot)
        })
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            report("close", &e);
            STATUS_FAILURE
        }
    }
}

/// Read entry point. Returns bytes read (0 at end of stream) or -1.
///
/// # Safety
/// Called by the native framework with a valid context and `buf` valid for
/// `size` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn protohook_read(ctx: *mut UrlContext, buf: *mut u8, size: c_int) -> c_int {
    let result = unsafe {
        with_call("read", ctx, |registry, protocol, ctx| {
            let target = read_target(buf, size, registry.config().max_transfer)?;
            let slot = StreamSlot::new(&mut ctx.host_stream);
            registry.dispatch_read(protocol, &slot, target)
        })
    };
    match result {
        Ok(n) => count_to_status(n),
        Err(e) => {
            report("read", &e);
            STATUS_FAILURE
        }
    }
}

/// Write entry point. Returns bytes written or -1.
///
/// # Safety
/// Called by the native framework with a valid context and `buf` valid for
/// `size` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn protohook_write(ctx: *mut UrlContext, buf: *const u8, size: c_int) -> c_int {
    let result = unsafe {
        with_call("write", ctx, |registry, protocol, ctx| {
            let source = write_source(buf, size, registry.config().max_transfer)?;
            let slot = StreamSlot::new(&mut ctx.host_stream);
            match registry.config().write_buffers {
                BufferMode::Borrow => registry.dispatch_write(protocol, &slot, source),
                BufferMode::Copy => {
                    let owned = source.to_vec();
                    registry.dispatch_write(protocol, &slot, &owned)
                }
            }
        })
    };
    match result {
        Ok(n) => count_to_status(n),
        Err(e) => {
            report("write", &e);
            STATUS_FAILURE
        }
    }
}

/// Seek entry point. Returns the new absolute offset (or the size for a size
/// query) or -1.
///
/// # Safety
/// Called by the native framework with a valid context.
#[no_mangle]
pub unsafe extern "C" fn protohook_seek(ctx: *mut UrlContext, pos: i64, whence: c_int) -> i64 {
    let result = unsafe {
        with_call("seek", ctx, |registry, protocol, ctx| {
            let request = SeekRequest::decode(pos, whence)?;
            let slot = StreamSlot::new(&mut ctx.host_stream);
            let offset = registry.dispatch_seek(protocol, &slot, request)?;
            offset_to_status(offset)
        })
    };
    match result {
        Ok(offset) => offset,
        Err(e) => {
            report("seek", &e);
            i64::from(STATUS_FAILURE)
        }
    }
}
