//! C-layout types shared with the native framework.
//!
//! The framework owns one `UrlContext` per open stream and passes it to every
//! callback of that stream. The host side only ever writes `host_stream`.

use std::os::raw::{c_char, c_int};

pub type OpenFn = unsafe extern "C" fn(ctx: *mut UrlContext, url: *const c_char, flags: c_int) -> c_int;
pub type CloseFn = unsafe extern "C" fn(ctx: *mut UrlContext) -> c_int;
pub type ReadFn = unsafe extern "C" fn(ctx: *mut UrlContext, buf: *mut u8, size: c_int) -> c_int;
pub type WriteFn = unsafe extern "C" fn(ctx: *mut UrlContext, buf: *const u8, size: c_int) -> c_int;
pub type SeekFn = unsafe extern "C" fn(ctx: *mut UrlContext, pos: i64, whence: c_int) -> i64;

/// The five callback slots of one protocol.
/// A `None` slot is a null function pointer on the C side.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackTable {
    pub open: Option<OpenFn>,
    pub close: Option<CloseFn>,
    pub read: Option<ReadFn>,
    pub write: Option<WriteFn>,
    pub seek: Option<SeekFn>,
}

/// Per-stream call context as laid out by the native framework.
#[repr(C)]
#[derive(Debug)]
pub struct UrlContext {
    /// Name of the protocol serving this stream (NUL-terminated, framework-owned)
    pub protocol_name: *const c_char,
    /// URL the stream was opened with (NUL-terminated, framework-owned)
    pub filename: *const c_char,
    /// Flags passed to open
    pub flags: c_int,
    /// Host token of the live stream, `NO_STREAM` when none
    pub host_stream: i64,
}

/// Value of `UrlContext::host_stream` when no stream is open.
pub const NO_STREAM: i64 = 0;

/// Open for reading.
pub const FLAG_READ: c_int = 1;
/// Open for writing.
pub const FLAG_WRITE: c_int = 2;
/// Open for reading and writing.
pub const FLAG_READ_WRITE: c_int = FLAG_READ | FLAG_WRITE;
/// Discard existing content when opening for writing.
pub const FLAG_TRUNCATE: c_int = 4;

pub const SEEK_SET: c_int = 0;
pub const SEEK_CUR: c_int = 1;
pub const SEEK_END: c_int = 2;
/// Query the stream size instead of moving.
pub const SEEK_SIZE: c_int = 0x10000;
/// Hint that the seek should happen even if expensive. Carries no meaning for hooks.
pub const SEEK_FORCE: c_int = 0x20000;

/// Status every callback returns on failure.
pub const STATUS_FAILURE: c_int = -1;

impl UrlContext {
    /// A context with no live stream.
    #[must_use]
    pub fn new(protocol_name: *const c_char, filename: *const c_char) -> Self {
        Self {
            protocol_name,
            filename,
            flags: 0,
            host_stream: NO_STREAM,
        }
    }
}
