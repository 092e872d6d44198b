//! The handler contract every pluggable protocol implementation satisfies.

use std::io::SeekFrom;
use std::os::raw::c_int;

use protocol_runtime::{
    FLAG_READ, FLAG_READ_WRITE, FLAG_TRUNCATE, FLAG_WRITE, SEEK_CUR, SEEK_END, SEEK_FORCE, SEEK_SET,
    SEEK_SIZE,
};

use crate::error::HookError;
use crate::idgen::StreamHandle;

/// Host-side implementation of one protocol's I/O.
///
/// Handlers are shared between native threads, so they keep their per-stream
/// state behind their own lock. Buffers are only valid for the duration of
/// the call.
pub trait ProtocolHook: Send + Sync {
    /// Open `filename` and bind it to `handle`.
    /// Fails with `AlreadyOpen` if `handle` is bound already.
    fn open(&self, handle: StreamHandle, filename: &str, flags: OpenFlags) -> Result<(), HookError>;

    /// Release the resource bound to `handle`.
    fn close(&self, handle: StreamHandle) -> Result<(), HookError>;

    /// Fill at most `buf.len()` bytes. End of stream is `Ok` with a short count.
    fn read(&self, handle: StreamHandle, buf: &mut [u8]) -> Result<usize, HookError>;

    /// Write from `buf`, returning how many bytes were taken.
    fn write(&self, handle: StreamHandle, buf: &[u8]) -> Result<usize, HookError>;

    /// Move the stream position, returning the new absolute offset.
    fn seek(&self, handle: StreamHandle, pos: SeekFrom) -> Result<u64, HookError>;

    /// Total size of the stream, without moving.
    fn size(&self, _handle: StreamHandle) -> Result<u64, HookError> {
        Err(HookError::Unsupported("size"))
    }
}

/// Access mode requested at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    pub const READ: Self = Self(FLAG_READ);
    pub const WRITE: Self = Self(FLAG_WRITE);
    pub const READ_WRITE: Self = Self(FLAG_READ_WRITE);
    pub const TRUNCATE: Self = Self(FLAG_TRUNCATE);

    /// Keep only the access and truncate bits of native open flags.
    #[must_use]
    pub fn from_raw(flags: c_int) -> Self {
        Self(flags & (FLAG_READ_WRITE | FLAG_TRUNCATE))
    }

    #[must_use]
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn bits(self) -> c_int {
        self.0
    }

    #[must_use]
    pub fn readable(self) -> bool {
        self.0 & FLAG_READ != 0
    }

    #[must_use]
    pub fn writable(self) -> bool {
        self.0 & FLAG_WRITE != 0
    }

    /// No access bits at all; handlers open read-write with create.
    #[must_use]
    pub fn unspecified(self) -> bool {
        self.0 & FLAG_READ_WRITE == 0
    }

    /// Existing content is dropped when the stream is writable.
    #[must_use]
    pub fn truncate(self) -> bool {
        self.0 & FLAG_TRUNCATE != 0
    }
}

/// A decoded seek call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekRequest {
    /// Move the position
    To(SeekFrom),
    /// Report the stream size
    Size,
}

impl SeekRequest {
    /// Decode a native `(pos, whence)` pair. The force bit is ignored.
    ///
    /// # Errors
    /// Unknown whence code, or a negative absolute position.
    pub fn decode(pos: i64, whence: c_int) -> Result<Self, HookError> {
        match whence & !SEEK_FORCE {
            SEEK_SET => u64::try_from(pos)
                .map(|pos| Self::To(SeekFrom::Start(pos)))
                .map_err(|_| HookError::invalid(format!("negative absolute position {pos}"))),
            SEEK_CUR => Ok(Self::To(SeekFrom::Current(pos))),
            SEEK_END => Ok(Self::To(SeekFrom::End(pos))),
            SEEK_SIZE => Ok(Self::Size),
            other => Err(HookError::invalid(format!("unknown whence {other:#x}"))),
        }
    }
}
