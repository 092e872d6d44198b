//! Copy one URL to another through a hooked protocol.
//!
//! `Session` plays the host: it owns a native protocol table, a registry
//! attached to the trampolines, and uninstalls everything when dropped.
//! `copy` plays the framework: it connects streams and calls whatever
//! callbacks the protocol currently has.

use std::fmt;
use std::os::raw::c_int;
use std::sync::Arc;

use protocol_runtime::{ProtocolRuntime, FLAG_READ, FLAG_TRUNCATE, FLAG_WRITE, SEEK_SIZE};
use protocol_runtime_mocked::{NativeStream, NativeTable};
use protohook::{attach, AttachGuard, HookConfig, InstallOutcome, ProtocolHook, ProtocolRegistry};
use tracing::{debug, info};

/// Protocols the native table starts with
pub const BUILTIN_PROTOCOLS: &[&str] = &["file", "http", "pipe"];

const CHUNK_SIZE: usize = 4096;

#[derive(Debug)]
pub enum CopyError {
    /// The protocol is unknown to the native table
    Connect { protocol: String },
    Install { protocol: String, outcome: InstallOutcome },
    Open { url: String, status: c_int },
    Read { url: String, status: c_int },
    Write { url: String, status: c_int },
    Close { url: String, status: c_int },
    /// The source ended before the size it reported
    Short { url: String, expected: u64, copied: u64 },
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { protocol } => write!(f, "Unknown protocol: {protocol}"),
            Self::Install { protocol, outcome } => {
                write!(f, "Cannot hook protocol {protocol}: {outcome:?}")
            }
            Self::Open { url, status } => write!(f, "Cannot open {url}: status {status}"),
            Self::Read { url, status } => write!(f, "Cannot read {url}: status {status}"),
            Self::Write { url, status } => write!(f, "Cannot write {url}: status {status}"),
            Self::Close { url, status } => write!(f, "Cannot close {url}: status {status}"),
            Self::Short { url, expected, copied } => {
                write!(f, "Short copy of {url}: {copied} of {expected} bytes")
            }
        }
    }
}

impl std::error::Error for CopyError {}

/// What a copy moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub bytes: u64,
    /// Size reported by the source before copying, if it could tell
    pub source_size: Option<u64>,
}

pub struct Session {
    pub table: Arc<NativeTable>,
    pub registry: Arc<ProtocolRegistry>,
    _attached: AttachGuard,
}

impl Session {
    /// Native table with `BUILTIN_PROTOCOLS` and an attached registry.
    #[must_use]
    pub fn new(config: HookConfig) -> Self {
        let table = Arc::new(NativeTable::with_builtin(BUILTIN_PROTOCOLS));
        let runtime: Arc<dyn ProtocolRuntime> = table.clone();
        let registry = Arc::new(ProtocolRegistry::new(runtime, config));
        let attached = attach(Arc::clone(&registry));
        Self {
            table,
            registry,
            _attached: attached,
        }
    }

    /// Hook `protocol` with `hook`.
    ///
    /// # Errors
    /// Anything but a fresh install.
    pub fn install(&self, protocol: &str, hook: Arc<dyn ProtocolHook>) -> Result<(), CopyError> {
        match self.registry.install(protocol, hook) {
            InstallOutcome::Installed => Ok(()),
            outcome => Err(CopyError::Install {
                protocol: protocol.to_string(),
                outcome,
            }),
        }
    }

    /// Copy `src` to `dst` over `protocol`.
    ///
    /// # Errors
    /// See `copy`.
    pub fn copy(&self, protocol: &str, src: &str, dst: &str) -> Result<CopyStats, CopyError> {
        copy(&self.table, protocol, src, dst)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let removed = self.registry.uninstall_all();
        debug!(removed, "session closed");
    }
}

fn open(table: &NativeTable, protocol: &str, url: &str, flags: c_int) -> Result<NativeStream, CopyError> {
    let mut stream = table.connect(protocol, url).ok_or_else(|| CopyError::Connect {
        protocol: protocol.to_string(),
    })?;
    let status = stream.open(flags);
    if status < 0 {
        return Err(CopyError::Open {
            url: url.to_string(),
            status,
        });
    }
    Ok(stream)
}

fn close(stream: &mut NativeStream, url: &str) -> Result<(), CopyError> {
    let status = stream.close();
    if status < 0 {
        return Err(CopyError::Close {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}

fn write_all(writer: &mut NativeStream, url: &str, mut data: &[u8]) -> Result<(), CopyError> {
    while !data.is_empty() {
        let status = writer.write(data);
        let taken = usize::try_from(status).unwrap_or(0);
        if taken == 0 {
            return Err(CopyError::Write {
                url: url.to_string(),
                status,
            });
        }
        data = &data[taken.min(data.len())..];
    }
    Ok(())
}

fn pump(reader: &mut NativeStream, src: &str, writer: &mut NativeStream, dst: &str) -> Result<u64, CopyError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let status = reader.read(&mut buf);
        let Ok(n) = usize::try_from(status) else {
            return Err(CopyError::Read {
                url: src.to_string(),
                status,
            });
        };
        if n == 0 {
            return Ok(total);
        }
        write_all(writer, dst, &buf[..n])?;
        total += n as u64;
    }
}

/// Copy `src` to `dst`, both served by `protocol` of `table`.
///
/// The destination is truncated first.
///
/// # Errors
/// A native callback reported failure, or fewer bytes than the source size
/// came through. Both streams are closed either way.
pub fn copy(table: &NativeTable, protocol: &str, src: &str, dst: &str) -> Result<CopyStats, CopyError> {
    let mut reader = open(table, protocol, src, FLAG_READ)?;
    let mut writer = match open(table, protocol, dst, FLAG_WRITE | FLAG_TRUNCATE) {
        Ok(writer) => writer,
        Err(e) => {
            let _ = reader.close();
            return Err(e);
        }
    };

    let source_size = u64::try_from(reader.seek(0, SEEK_SIZE)).ok();
    match source_size {
        Some(size) => info!(url = %src, size, "source size"),
        None => debug!(url = %src, "source size unknown"),
    }

    let copied = pump(&mut reader, src, &mut writer, dst);
    let writer_closed = close(&mut writer, dst);
    let reader_closed = close(&mut reader, src);

    let bytes = copied?;
    writer_closed?;
    reader_closed?;
    if let Some(expected) = source_size {
        if bytes < expected {
            return Err(CopyError::Short {
                url: src.to_string(),
                expected,
                copied: bytes,
            });
        }
    }
    info!(src = %src, dst = %dst, bytes, "copied");
    Ok(CopyStats { bytes, source_size })
}
