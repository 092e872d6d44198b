//! In-memory protocol handler
//!
//! Named byte buffers shared by every stream opened on the same name, with a
//! private cursor per stream. Opening for write creates a missing name; opening
//! read-only requires it to exist. Nothing is ever truncated.

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::HookError;
use crate::hook::{OpenFlags, ProtocolHook};
use crate::idgen::StreamHandle;

/// Shared storage of one name
pub type MemBuffer = Arc<Mutex<Vec<u8>>>;

struct MemStream {
    buffer: MemBuffer,
    pos: u64,
    writable: bool,
}

pub struct MemHook {
    files: Mutex<HashMap<String, MemBuffer>>,
    streams: Mutex<HashMap<StreamHandle, MemStream>>,
}

impl MemHook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Create or replace the content of `name`
    pub fn add_file(&self, name: impl Into<String>, content: Vec<u8>) {
        self.files
            .lock()
            .insert(name.into(), Arc::new(Mutex::new(content)));
    }

    /// Snapshot of the content of `name`
    #[must_use]
    pub fn get_file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|buffer| buffer.lock().clone())
    }

    /// Number of streams currently open
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.streams.lock().len()
    }

    fn buffer_for_open(&self, name: &str, create: bool) -> Result<MemBuffer, HookError> {
        let mut files = self.files.lock();
        if let Some(buffer) = files.get(name) {
            return Ok(Arc::clone(buffer));
        }
        if !create {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("no such buffer: {name}")).into());
        }
        let buffer = Arc::new(Mutex::new(Vec::new()));
        files.insert(name.to_string(), Arc::clone(&buffer));
        Ok(buffer)
    }
}

impl Default for MemHook {
    fn default() -> Self {
        Self::new()
    }
}

fn to_index(pos: u64) -> Result<usize, HookError> {
    usize::try_from(pos).map_err(|_| HookError::invalid(format!("position {pos} out of range")))
}

impl ProtocolHook for MemHook {
    fn open(&self, handle: StreamHandle, filename: &str, flags: OpenFlags) -> Result<(), HookError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(&handle) {
            return Err(HookError::AlreadyOpen(handle));
        }

        let writable = flags.writable() || flags.unspecified();
        let buffer = self.buffer_for_open(filename, writable)?;
        if writable && flags.truncate() {
            buffer.lock().clear();
        }
        streams.insert(
            handle,
            MemStream {
                buffer,
                pos: 0,
                writable,
            },
        );
        trace!(stream = %handle, filename = %filename, writable, "mem open");
        Ok(())
    }

    fn close(&self, handle: StreamHandle) -> Result<(), HookError> {
        self.streams
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or(HookError::NotOpen(handle))
    }

    fn read(&self, handle: StreamHandle, buf: &mut [u8]) -> Result<usize, HookError> {
        let mut streams = self.streams.lock();
        let stream = streams.get_mut(&handle).ok_or(HookError::NotOpen(handle))?;

        let data = stream.buffer.lock();
        let start = to_index(stream.pos)?.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(data);

        stream.pos += n as u64;
        Ok(n)
    }

    fn write(&self, handle: StreamHandle, buf: &[u8]) -> Result<usize, HookError> {
        let mut streams = self.streams.lock();
        let stream = streams.get_mut(&handle).ok_or(HookError::NotOpen(handle))?;
        if !stream.writable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream opened read-only").into());
        }

        let mut data = stream.buffer.lock();
        let start = to_index(stream.pos)?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write past addressable range"))?;
        if data.len() < end {
            let cur_len = data.len();
            data.try_reserve(end - cur_len)
                .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        drop(data);

        stream.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&self, handle: StreamHandle, pos: SeekFrom) -> Result<u64, HookError> {
        let mut streams = self.streams.lock();
        let stream = streams.get_mut(&handle).ok_or(HookError::NotOpen(handle))?;
        let len = stream.buffer.lock().len() as u64;

        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => stream.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            HookError::from(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream"))
        })?;

        stream.pos = target;
        Ok(target)
    }

    fn size(&self, handle: StreamHandle) -> Result<u64, HookError> {
        let streams = self.streams.lock();
        let stream = streams.get(&handle).ok_or(HookError::NotOpen(handle))?;
        let len = stream.buffer.lock().len();
        Ok(len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_open_requires_existing_name() {
        let hook = MemHook::new();

        let err = hook.open(StreamHandle::new(1), "missing", OpenFlags::READ).unwrap_err();
        assert!(matches!(err, HookError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));

        hook.add_file("present", b"abc".to_vec());
        hook.open(StreamHandle::new(1), "present", OpenFlags::READ).unwrap();
    }

    #[test]
    fn read_only_stream_rejects_write() {
        let hook = MemHook::new();
        hook.add_file("a", Vec::new());
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::READ).unwrap();

        assert!(hook.write(h, b"x").is_err());
    }

    #[test]
    fn streams_on_same_name_have_own_cursor() {
        let hook = MemHook::new();
        hook.add_file("a", b"0123456789".to_vec());
        let (h1, h2) = (StreamHandle::new(1), StreamHandle::new(2));
        hook.open(h1, "a", OpenFlags::READ).unwrap();
        hook.open(h2, "a", OpenFlags::READ).unwrap();

        let mut buf = [0u8; 4];
        hook.read(h1, &mut buf).unwrap();
        assert_eq!(&buf, b"0123");
        hook.read(h2, &mut buf).unwrap();
        assert_eq!(&buf, b"0123");
        hook.read(h1, &mut buf).unwrap();
        assert_eq!(&buf, b"4567");
    }

    #[test]
    fn write_past_end_zero_fills() {
        let hook = MemHook::new();
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::WRITE).unwrap();

        hook.seek(h, SeekFrom::Start(2)).unwrap();
        hook.write(h, b"xy").unwrap();

        assert_eq!(hook.get_file("a").unwrap(), b"\0\0xy");
    }

    #[test]
    fn write_at_unaddressable_offset_fails() {
        let hook = MemHook::new();
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::WRITE).unwrap();

        hook.seek(h, SeekFrom::Start(i64::MAX as u64)).unwrap();
        let err = hook.write(h, b"x").unwrap_err();

        assert!(matches!(
            err,
            HookError::Io(ref e) if matches!(e.kind(), io::ErrorKind::OutOfMemory | io::ErrorKind::InvalidInput)
        ));
        assert_eq!(hook.get_file("a").unwrap(), b"");
    }

    #[test]
    fn write_at_last_offset_overflows_cleanly() {
        let hook = MemHook::new();
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::WRITE).unwrap();

        hook.seek(h, SeekFrom::Start(u64::MAX)).unwrap();
        assert!(hook.write(h, b"x").is_err());
    }

    #[test]
    fn truncate_open_clears_buffer() {
        let hook = MemHook::new();
        hook.add_file("a", b"old content".to_vec());
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::WRITE.with(OpenFlags::TRUNCATE)).unwrap();

        hook.write(h, b"new").unwrap();

        assert_eq!(hook.get_file("a").unwrap(), b"new");
    }

    #[test]
    fn seek_before_start_fails_and_keeps_position() {
        let hook = MemHook::new();
        hook.add_file("a", b"abc".to_vec());
        let h = StreamHandle::new(1);
        hook.open(h, "a", OpenFlags::READ).unwrap();
        hook.seek(h, SeekFrom::Start(1)).unwrap();

        assert!(hook.seek(h, SeekFrom::Current(-2)).is_err());
        assert_eq!(hook.seek(h, SeekFrom::Current(0)).unwrap(), 1);
        assert_eq!(hook.seek(h, SeekFrom::End(-1)).unwrap(), 2);
    }

    #[test]
    fn close_unknown_handle_fails() {
        let hook = MemHook::new();
        assert!(matches!(
            hook.close(StreamHandle::new(9)),
            Err(HookError::NotOpen(_))
        ));
    }
}
