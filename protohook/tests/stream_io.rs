#[macro_use]
extern crate hamcrest;

mod common;

use std::io::SeekFrom;
use std::sync::Arc;

use common::Harness;
use hamcrest::prelude::*;
use protocol_runtime::{
    FLAG_READ, FLAG_READ_WRITE, FLAG_WRITE, NO_STREAM, SEEK_CUR, SEEK_END, SEEK_FORCE, SEEK_SET,
    SEEK_SIZE,
};
use protocol_runtime_mocked::NativeStream;
use protohook::{
    BufferMode, FileHook, HookConfig, HookError, MemHook, OpenFlags, ProtocolHook, StreamHandle,
    CALLBACKS,
};

fn mem_harness(config: HookConfig) -> (Harness, Arc<MemHook>) {
    let h = Harness::with_config(&["file", "mem"], config);
    let hook = Arc::new(MemHook::new());
    h.registry.install("mem", hook.clone());
    (h, hook)
}

#[test]
fn hello_round_trip_through_file_hook() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(&["file"]);
    h.registry.install("file", Arc::new(FileHook::with_root(dir.path())));

    let mut writer = h.connect("file", "file:hello.txt");
    assert_eq!(writer.open(FLAG_WRITE), 0);
    assert_ne!(writer.context().host_stream, NO_STREAM);
    assert_eq!(writer.write(b"hello"), 5);
    assert_eq!(writer.close(), 0);
    assert_eq!(writer.context().host_stream, NO_STREAM);

    assert_that!(
        std::fs::read(dir.path().join("hello.txt")).unwrap(),
        is(equal_to(b"hello".to_vec()))
    );

    let mut reader = h.connect("file", "file:hello.txt");
    assert_eq!(reader.open(FLAG_READ), 0);
    assert_eq!(reader.seek(0, SEEK_SIZE), 5);
    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf), 5);
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(reader.read(&mut buf), 0);
    assert_eq!(reader.close(), 0);
}

#[test]
fn open_of_missing_file_read_only_fails() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(&["file"]);
    h.registry.install("file", Arc::new(FileHook::with_root(dir.path())));

    let mut stream = h.connect("file", "file:missing.txt");

    assert_eq!(stream.open(FLAG_READ), -1);
    assert_eq!(stream.context().host_stream, NO_STREAM);
}

#[test]
fn zero_flags_open_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(&["file"]);
    h.registry.install("file", Arc::new(FileHook::with_root(dir.path())));

    let mut stream = h.connect("file", "created.bin");
    assert_eq!(stream.open(0), 0);
    assert_eq!(stream.write(b"xyz"), 3);
    assert_eq!(stream.seek(0, SEEK_SET), 0);
    let mut buf = [0u8; 3];
    assert_eq!(stream.read(&mut buf), 3);
    assert_eq!(stream.close(), 0);

    assert!(dir.path().join("created.bin").exists());
}

#[test]
fn double_close_fails() {
    let (h, hook) = mem_harness(HookConfig::default());
    let mut stream = h.connect("mem", "a");

    assert_eq!(stream.open(FLAG_READ_WRITE), 0);
    assert_eq!(stream.close(), 0);
    assert_eq!(stream.close(), -1);
    assert_eq!(hook.open_streams(), 0);
}

#[test]
fn double_open_fails_and_keeps_stream() {
    let (h, hook) = mem_harness(HookConfig::default());
    let mut stream = h.connect("mem", "a");

    assert_eq!(stream.open(FLAG_READ_WRITE), 0);
    let bound = stream.context().host_stream;
    assert_eq!(stream.open(FLAG_READ_WRITE), -1);

    assert_eq!(stream.context().host_stream, bound);
    assert_eq!(hook.open_streams(), 1);
    assert_eq!(stream.write(b"ok"), 2);
    assert_eq!(stream.close(), 0);
}

#[test]
fn calls_before_open_fail() {
    let (h, _hook) = mem_harness(HookConfig::default());
    let mut stream = h.connect("mem", "a");
    let mut buf = [0u8; 4];

    assert_eq!(stream.read(&mut buf), -1);
    assert_eq!(stream.write(b"x"), -1);
    assert_eq!(stream.seek(0, SEEK_SET), -1);
    assert_eq!(stream.close(), -1);
}

#[test]
fn each_open_gets_a_fresh_handle() {
    let (h, _hook) = mem_harness(HookConfig::default());
    let mut first = h.connect("mem", "a");
    let mut second = h.connect("mem", "a");

    assert_eq!(first.open(FLAG_READ_WRITE), 0);
    assert_eq!(second.open(FLAG_READ_WRITE), 0);
    let (a, b) = (first.context().host_stream, second.context().host_stream);
    assert_ne!(a, NO_STREAM);
    assert_ne!(b, NO_STREAM);
    assert_ne!(a, b);

    // Reopening after close never reuses a handle
    assert_eq!(first.close(), 0);
    assert_eq!(first.open(FLAG_READ_WRITE), 0);
    assert_ne!(first.context().host_stream, a);
    assert_ne!(first.context().host_stream, b);
}

#[test]
fn zero_size_read_returns_zero() {
    let (h, hook) = mem_harness(HookConfig::default());
    hook.add_file("a", b"data".to_vec());
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ), 0);

    assert_eq!(stream.read(&mut []), 0);
    assert_eq!(stream.read_raw(std::ptr::null_mut(), 0), 0);

    // Nothing was consumed
    let mut buf = [0u8; 4];
    assert_eq!(stream.read(&mut buf), 4);
}

#[test]
fn bad_buffers_fail() {
    let (h, _hook) = mem_harness(HookConfig::default());
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ_WRITE), 0);

    assert_eq!(stream.read_raw(std::ptr::null_mut(), 4), -1);
    assert_eq!(stream.write_raw(std::ptr::null(), 4), -1);

    let mut buf = [0u8; 4];
    assert_eq!(stream.read_raw(buf.as_mut_ptr(), -1), -1);
    assert_eq!(stream.write_raw(buf.as_ptr(), -1), -1);
}

#[test]
fn read_past_end_is_short() {
    let (h, hook) = mem_harness(HookConfig::default());
    hook.add_file("a", b"0123456789".to_vec());
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ), 0);

    let mut buf = [0u8; 8];
    assert_eq!(stream.read(&mut buf), 8);
    assert_eq!(stream.read(&mut buf), 2);
    assert_eq!(&buf[..2], b"89");
    assert_eq!(stream.read(&mut buf), 0);
}

#[test]
fn seek_origins_and_size_query() {
    let (h, hook) = mem_harness(HookConfig::default());
    hook.add_file("a", b"0123456789".to_vec());
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ), 0);

    assert_eq!(stream.seek(3, SEEK_SET), 3);
    assert_eq!(stream.seek(2, SEEK_CUR), 5);
    assert_eq!(stream.seek(-1, SEEK_END), 9);
    assert_eq!(stream.seek(0, SEEK_SIZE), 10);
    assert_eq!(stream.seek(4, SEEK_SET | SEEK_FORCE), 4);

    // Rejected seeks leave the position alone
    assert_eq!(stream.seek(-1, SEEK_SET), -1);
    assert_eq!(stream.seek(0, 7), -1);
    assert_eq!(stream.seek(-10, SEEK_CUR), -1);
    assert_eq!(stream.seek(0, SEEK_CUR), 4);

    let mut buf = [0u8; 2];
    assert_eq!(stream.read(&mut buf), 2);
    assert_eq!(&buf, b"45");
}

/// Handler that can only move forward and cannot report a size
struct Forward(MemHook);

impl ProtocolHook for Forward {
    fn open(&self, handle: StreamHandle, filename: &str, flags: OpenFlags) -> Result<(), HookError> {
        self.0.open(handle, filename, flags)
    }

    fn close(&self, handle: StreamHandle) -> Result<(), HookError> {
        self.0.close(handle)
    }

    fn read(&self, handle: StreamHandle, buf: &mut [u8]) -> Result<usize, HookError> {
        self.0.read(handle, buf)
    }

    fn write(&self, handle: StreamHandle, buf: &[u8]) -> Result<usize, HookError> {
        self.0.write(handle, buf)
    }

    fn seek(&self, handle: StreamHandle, pos: SeekFrom) -> Result<u64, HookError> {
        match pos {
            SeekFrom::Current(delta) if delta >= 0 => self.0.seek(handle, pos),
            _ => Err(HookError::Unsupported("seek")),
        }
    }
}

#[test]
fn handler_without_size_fails_size_query() {
    let h = Harness::new(&["mem"]);
    let inner = MemHook::new();
    inner.add_file("a", b"abc".to_vec());
    h.registry.install("mem", Arc::new(Forward(inner)));

    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ), 0);

    assert_eq!(stream.seek(0, SEEK_SIZE), -1);
    assert_eq!(stream.seek(0, SEEK_SET), -1);
    assert_eq!(stream.seek(1, SEEK_CUR), 1);
}

#[test]
fn unhooked_protocol_fails_every_call() {
    let _h = Harness::new(&["file"]);
    let mut stream = NativeStream::detached("ftp", "ftp://host/a", CALLBACKS).unwrap();
    let mut buf = [0u8; 4];

    assert_eq!(stream.open(FLAG_READ), -1);
    assert_eq!(stream.context().host_stream, NO_STREAM);
    assert_eq!(stream.read(&mut buf), -1);
    assert_eq!(stream.write(b"x"), -1);
    assert_eq!(stream.seek(0, SEEK_SET), -1);
    assert_eq!(stream.close(), -1);
}

#[test]
fn calls_after_uninstall_fail() {
    let (h, hook) = mem_harness(HookConfig::default());
    hook.add_file("a", b"abc".to_vec());
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ), 0);

    h.registry.uninstall("mem");

    let mut buf = [0u8; 4];
    assert_eq!(stream.read(&mut buf), -1);
    assert_eq!(stream.close(), -1);
}

#[test]
fn copy_mode_writes_reach_handler() {
    let config = HookConfig {
        write_buffers: BufferMode::Copy,
        ..HookConfig::default()
    };
    let (h, hook) = mem_harness(config);
    let mut stream = h.connect("mem", "out");
    assert_eq!(stream.open(FLAG_WRITE), 0);

    assert_eq!(stream.write(b"copied"), 6);
    assert_eq!(stream.write(b""), 0);
    assert_eq!(stream.close(), 0);

    assert_that!(hook.get_file("out").unwrap(), is(equal_to(b"copied".to_vec())));
}

#[test]
fn transfers_are_capped() {
    let config = HookConfig {
        max_transfer: 4,
        ..HookConfig::default()
    };
    let (h, hook) = mem_harness(config);
    let mut stream = h.connect("mem", "a");
    assert_eq!(stream.open(FLAG_READ_WRITE), 0);

    assert_eq!(stream.write(b"hello"), 4);
    assert_eq!(hook.get_file("a").unwrap(), b"hell");

    assert_eq!(stream.seek(0, SEEK_SET), 0);
    let mut buf = [0u8; 16];
    assert_eq!(stream.read(&mut buf), 4);
}

#[test]
fn builtin_protocols_stay_untouched() {
    let (h, _hook) = mem_harness(HookConfig::default());
    let mut stream = h.connect("file", "a");

    assert_eq!(stream.open(FLAG_READ), protocol_runtime_mocked::BUILTIN_STATUS);
}
