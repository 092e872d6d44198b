//! Dispatch core - host side of the five entry points
//!
//! Works on already-marshalled values: an owned protocol name, the stream slot
//! of the native context, and bounded slices. The `ffi` module does the
//! pointer work and turns these results into native status codes.
//!
//! Handle lifecycle: `open` mints a fresh `StreamHandle` and binds it to the
//! slot only after the handler accepted it; `close` clears the slot only after
//! the handler released the resource, or reported it never had it.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::HookError;
use crate::hook::{OpenFlags, ProtocolHook, SeekRequest};
use crate::idgen::StreamHandle;
use crate::registry::ProtocolRegistry;
use protocol_runtime::NO_STREAM;

/// The host token slot of one native context.
pub struct StreamSlot<'a>(&'a mut i64);

impl<'a> StreamSlot<'a> {
    pub fn new(raw: &'a mut i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn handle(&self) -> Option<StreamHandle> {
        StreamHandle::from_raw(*self.0)
    }

    fn bind(&mut self, handle: StreamHandle) {
        *self.0 = handle.id();
    }

    fn clear(&mut self) {
        *self.0 = NO_STREAM;
    }
}

impl ProtocolRegistry {
    fn hook_for(&self, protocol: &str) -> Result<Arc<dyn ProtocolHook>, HookError> {
        self.resolve(protocol)
            .ok_or_else(|| HookError::ProtocolNotRegistered(protocol.to_string()))
    }

    /// Open `filename` on a fresh handle and bind it to `slot`.
    ///
    /// # Errors
    /// No handler, the slot already holds a stream, or the handler failed.
    pub fn dispatch_open(
        &self,
        protocol: &str,
        slot: &mut StreamSlot<'_>,
        filename: &str,
        flags: OpenFlags,
    ) -> Result<StreamHandle, HookError> {
        let hook = self.hook_for(protocol)?;
        if let Some(current) = slot.handle() {
            return Err(HookError::AlreadyOpen(current));
        }

        let handle = self.mint_handle();
        debug!(protocol = %protocol, stream = %handle, filename = %filename, "open");
        hook.open(handle, filename, flags)?;
        slot.bind(handle);
        Ok(handle)
    }

    /// Close the stream bound to `slot`.
    ///
    /// # Errors
    /// No handler, no stream in the slot, or the handler failed.
    pub fn dispatch_close(&self, protocol: &str, slot: &mut StreamSlot<'_>) -> Result<(), HookError> {
        let hook = self.hook_for(protocol)?;
        let handle = slot.handle().ok_or(HookError::NoStream)?;

        debug!(protocol = %protocol, stream = %handle, "close");
        match hook.close(handle) {
            Ok(()) => {
                slot.clear();
                Ok(())
            }
            Err(HookError::NotOpen(stale)) => {
                // The handler already forgot the stream; unbind so the context can be reused
                warn!(protocol = %protocol, stream = %stale, "handler does not know stream, unbinding");
                slot.clear();
                Err(HookError::NotOpen(stale))
            }
            Err(e) => Err(e),
        }
    }

    /// Read into `buf`. End of stream is `Ok` with a short count.
    ///
    /// # Errors
    /// No handler, no stream in the slot, or the handler failed.
    pub fn dispatch_read(
        &self,
        protocol: &str,
        slot: &StreamSlot<'_>,
        buf: &mut [u8],
    ) -> Result<usize, HookError> {
        let hook = self.hook_for(protocol)?;
        let handle = slot.handle().ok_or(HookError::NoStream)?;

        trace!(protocol = %protocol, stream = %handle, size = buf.len(), "read");
        if buf.is_empty() {
            return Ok(0);
        }
        let n = hook.read(handle, buf)?;
        if n > buf.len() {
            warn!(protocol = %protocol, stream = %handle, n, size = buf.len(), "handler over-reported read");
            return Err(HookError::invalid("read count exceeds buffer"));
        }
        Ok(n)
    }

    /// Write from `buf`.
    ///
    /// # Errors
    /// No handler, no stream in the slot, or the handler failed.
    pub fn dispatch_write(
        &self,
        protocol: &str,
        slot: &StreamSlot<'_>,
        buf: &[u8],
    ) -> Result<usize, HookError> {
        let hook = self.hook_for(protocol)?;
        let handle = slot.handle().ok_or(HookError::NoStream)?;

        trace!(protocol = %protocol, stream = %handle, size = buf.len(), "write");
        let n = hook.write(handle, buf)?;
        Ok(n.min(buf.len()))
    }

    /// Seek or query size. Returns the new absolute offset, or the size.
    ///
    /// # Errors
    /// No handler, no stream in the slot, or the handler failed.
    pub fn dispatch_seek(
        &self,
        protocol: &str,
        slot: &StreamSlot<'_>,
        request: SeekRequest,
    ) -> Result<u64, HookError> {
        let hook = self.hook_for(protocol)?;
        let handle = slot.handle().ok_or(HookError::NoStream)?;

        trace!(protocol = %protocol, stream = %handle, request = ?request, "seek");
        match request {
            SeekRequest::To(pos) => hook.seek(handle, pos),
            SeekRequest::Size => hook.size(handle),
        }
    }
}
