//! A stream as the native framework drives it: one heap-pinned `UrlContext`
//! whose address stays stable from open to close, and the callback table the
//! protocol had when the stream was connected.

use std::ffi::CString;
use std::os::raw::c_int;

use protocol_runtime::{CallbackTable, UrlContext, STATUS_FAILURE};

pub struct NativeStream {
    // `ctx` points into these
    _protocol: CString,
    _url: CString,
    ctx: Box<UrlContext>,
    callbacks: CallbackTable,
}

impl NativeStream {
    /// Stream of `protocol` calling `callbacks` directly, bypassing any table.
    /// Returns `None` if a name contains a NUL byte.
    #[must_use]
    pub fn detached(protocol: &str, url: &str, callbacks: CallbackTable) -> Option<Self> {
        let protocol = CString::new(protocol).ok()?;
        let url = CString::new(url).ok()?;
        let ctx = Box::new(UrlContext::new(protocol.as_ptr(), url.as_ptr()));
        Some(Self {
            _protocol: protocol,
            _url: url,
            ctx,
            callbacks,
        })
    }

    #[must_use]
    pub fn context(&self) -> &UrlContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut UrlContext {
        &mut self.ctx
    }

    pub fn open(&mut self, flags: c_int) -> c_int {
        let Some(open) = self.callbacks.open else {
            return STATUS_FAILURE;
        };
        self.ctx.flags = flags;
        let url = self.ctx.filename;
        unsafe { open(&mut *self.ctx, url, flags) }
    }

    pub fn close(&mut self) -> c_int {
        let Some(close) = self.callbacks.close else {
            return STATUS_FAILURE;
        };
        unsafe { close(&mut *self.ctx) }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> c_int {
        let size = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        self.read_raw(buf.as_mut_ptr(), size)
    }

    /// Call read with an arbitrary pointer and size, as a misbehaving caller could.
    pub fn read_raw(&mut self, buf: *mut u8, size: c_int) -> c_int {
        let Some(read) = self.callbacks.read else {
            return STATUS_FAILURE;
        };
        unsafe { read(&mut *self.ctx, buf, size) }
    }

    pub fn write(&mut self, buf: &[u8]) -> c_int {
        let size = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        self.write_raw(buf.as_ptr(), size)
    }

    /// Call write with an arbitrary pointer and size, as a misbehaving caller could.
    pub fn write_raw(&mut self, buf: *const u8, size: c_int) -> c_int {
        let Some(write) = self.callbacks.write else {
            return STATUS_FAILURE;
        };
        unsafe { write(&mut *self.ctx, buf, size) }
    }

    pub fn seek(&mut self, pos: i64, whence: c_int) -> i64 {
        let Some(seek) = self.callbacks.seek else {
            return i64::from(STATUS_FAILURE);
        };
        unsafe { seek(&mut *self.ctx, pos, whence) }
    }
}
