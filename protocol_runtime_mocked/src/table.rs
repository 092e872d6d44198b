//! In-process model of the native framework's protocol table.
//!
//! - `with_builtin` creates protocols whose callbacks are the `builtin_*` stubs.
//! - `register_protocol` saves the protocol's callbacks into one of `MAX_HOOKS`
//!   hook slots and splices in the given table.
//! - `unregister_protocol` restores the saved callbacks and frees the slot.
//! - `connect` plays the framework's role: it returns a `NativeStream` that calls
//!   whatever callbacks the protocol has at that moment.
//!
//! Failures return -1 and set an errno readable through `get_errno`:
//! `ENOENT` for an unknown protocol, `EBUSY` when already hooked, `ENOSPC` when
//! every hook slot is taken, `EINVAL` when unhooking a protocol that is not hooked.

use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use protocol_runtime::{CallbackTable, ProtocolRuntime, UrlContext, STATUS_FAILURE};

use crate::stream::NativeStream;

/// Number of protocols that can be hooked at the same time.
pub const MAX_HOOKS: usize = 50;

pub const ENOENT: c_int = 2;
pub const EBUSY: c_int = 16;
pub const EINVAL: c_int = 22;
pub const ENOSPC: c_int = 28;
pub const ENOSYS: c_int = 38;

/// What the builtin (unhooked) callbacks return.
pub const BUILTIN_STATUS: c_int = -ENOSYS;

struct NativeProtocol {
    name: String,
    callbacks: CallbackTable,
}

struct HookSlot {
    name: String,
    originals: CallbackTable,
}

pub struct NativeTable {
    protocols: Mutex<Vec<NativeProtocol>>,
    hooks: Mutex<Vec<Option<HookSlot>>>,
    errno: AtomicI32,
}

impl Default for NativeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeTable {
    #[must_use]
    pub fn new() -> Self {
        let mut hooks = Vec::with_capacity(MAX_HOOKS);
        hooks.resize_with(MAX_HOOKS, || None);
        Self {
            protocols: Mutex::new(Vec::new()),
            hooks: Mutex::new(hooks),
            errno: AtomicI32::new(0),
        }
    }

    /// Table with the given protocols, all served by the builtin callbacks.
    #[must_use]
    pub fn with_builtin(names: &[&str]) -> Self {
        let table = Self::new();
        for name in names {
            table.add_protocol(name, builtin_callbacks());
        }
        table
    }

    pub fn add_protocol(&self, name: &str, callbacks: CallbackTable) {
        self.protocols.lock().push(NativeProtocol {
            name: name.to_string(),
            callbacks,
        });
    }

    /// Current callbacks of a protocol.
    #[must_use]
    pub fn callbacks(&self, name: &str) -> Option<CallbackTable> {
        self.protocols
            .lock()
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.callbacks)
    }

    #[must_use]
    pub fn is_hooked(&self, name: &str) -> bool {
        self.hooks
            .lock()
            .iter()
            .flatten()
            .any(|slot| slot.name == name)
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.lock().iter().flatten().count()
    }

    #[must_use]
    pub fn get_errno(&self) -> c_int {
        self.errno.load(Ordering::Relaxed)
    }

    /// Prepare a stream of `protocol` for `url`, as the framework does before
    /// calling open. Returns `None` for an unknown protocol or a name with NUL.
    #[must_use]
    pub fn connect(&self, protocol: &str, url: &str) -> Option<NativeStream> {
        let callbacks = self.callbacks(protocol)?;
        NativeStream::detached(protocol, url, callbacks)
    }

    fn fail(&self, errno: c_int) -> c_int {
        self.errno.store(errno, Ordering::Relaxed);
        STATUS_FAILURE
    }
}

impl ProtocolRuntime for NativeTable {
    fn register_protocol(&self, name: &str, table: &CallbackTable) -> c_int {
        self.errno.store(0, Ordering::Relaxed);
        let mut protocols = self.protocols.lock();
        let mut hooks = self.hooks.lock();

        let Some(protocol) = protocols.iter_mut().find(|p| p.name == name) else {
            return self.fail(ENOENT);
        };
        if hooks.iter().flatten().any(|slot| slot.name == name) {
            return self.fail(EBUSY);
        }
        let Some(free) = hooks.iter_mut().find(|slot| slot.is_none()) else {
            return self.fail(ENOSPC);
        };

        *free = Some(HookSlot {
            name: name.to_string(),
            originals: protocol.callbacks,
        });
        protocol.callbacks = *table;
        0
    }

    fn unregister_protocol(&self, name: &str) -> c_int {
        self.errno.store(0, Ordering::Relaxed);
        let mut protocols = self.protocols.lock();
        let mut hooks = self.hooks.lock();

        let Some(protocol) = protocols.iter_mut().find(|p| p.name == name) else {
            return self.fail(ENOENT);
        };
        let Some(slot) = hooks
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|s| s.name == name))
        else {
            return self.fail(EINVAL);
        };

        if let Some(saved) = slot.take() {
            protocol.callbacks = saved.originals;
        }
        0
    }
}

/// Callbacks of an unhooked builtin protocol.
#[must_use]
pub fn builtin_callbacks() -> CallbackTable {
    CallbackTable {
        open: Some(builtin_open),
        close: Some(builtin_close),
        read: Some(builtin_read),
        write: Some(builtin_write),
        seek: Some(builtin_seek),
    }
}

unsafe extern "C" fn builtin_open(_ctx: *mut UrlContext, _url: *const c_char, _flags: c_int) -> c_int {
    BUILTIN_STATUS
}

unsafe extern "C" fn builtin_close(_ctx: *mut UrlContext) -> c_int {
    BUILTIN_STATUS
}

unsafe extern "C" fn builtin_read(_ctx: *mut UrlContext, _buf: *mut u8, _size: c_int) -> c_int {
    BUILTIN_STATUS
}

unsafe extern "C" fn builtin_write(_ctx: *mut UrlContext, _buf: *const u8, _size: c_int) -> c_int {
    BUILTIN_STATUS
}

unsafe extern "C" fn builtin_seek(_ctx: *mut UrlContext, _pos: i64, _whence: c_int) -> i64 {
    i64::from(BUILTIN_STATUS)
}
