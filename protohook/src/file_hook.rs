//! Filesystem-backed reference handler
//!
//! Maps each stream handle to one open `File`. URLs may carry a `file:` scheme
//! prefix, which is stripped; relative names resolve against the optional root.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::HookError;
use crate::hook::{OpenFlags, ProtocolHook};
use crate::idgen::StreamHandle;

pub struct FileHook {
    root: Option<PathBuf>,
    // The map lock is held only for lookups and inserts; I/O runs under the
    // per-file lock.
    files: Mutex<HashMap<StreamHandle, Arc<Mutex<File>>>>,
}

impl FileHook {
    /// Handler resolving names against the current directory
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: None,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Handler resolving relative names against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Filesystem path for a URL
    #[must_use]
    pub fn resolve_path(&self, url: &str) -> PathBuf {
        let name = url.strip_prefix("file:").unwrap_or(url);
        match &self.root {
            Some(root) => root.join(name),
            None => Path::new(name).to_path_buf(),
        }
    }

    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.files.lock().len()
    }

    fn file(&self, handle: StreamHandle) -> Result<Arc<Mutex<File>>, HookError> {
        self.files.lock().get(&handle).cloned().ok_or_else(|| {
            warn!(stream = %handle, "file not open");
            HookError::NotOpen(handle)
        })
    }
}

impl Default for FileHook {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolHook for FileHook {
    fn open(&self, handle: StreamHandle, filename: &str, flags: OpenFlags) -> Result<(), HookError> {
        if self.files.lock().contains_key(&handle) {
            warn!(stream = %handle, filename = %filename, "file already open");
            return Err(HookError::AlreadyOpen(handle));
        }

        // Write access, or no access bits at all, means read-write with create
        let writable = flags.unspecified() || flags.writable();
        let truncate = writable && flags.truncate();

        let path = self.resolve_path(filename);
        debug!(stream = %handle, path = %path.display(), writable, truncate, "opening file");
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .truncate(truncate)
            .open(&path)
            .map_err(|e| {
                warn!(path = %path.display(), error = %e, "cannot open file");
                HookError::Io(e)
            })?;

        match self.files.lock().entry(handle) {
            Entry::Occupied(_) => {
                warn!(stream = %handle, filename = %filename, "file opened twice concurrently");
                Err(HookError::AlreadyOpen(handle))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(file)));
                Ok(())
            }
        }
    }

    fn close(&self, handle: StreamHandle) -> Result<(), HookError> {
        let file = self.file(handle)?;
        debug!(stream = %handle, "closing file");
        // A failed flush keeps the stream open so close can be retried
        file.lock().flush()?;
        self.files.lock().remove(&handle);
        Ok(())
    }

    fn read(&self, handle: StreamHandle, buf: &mut [u8]) -> Result<usize, HookError> {
        let file = self.file(handle)?;
        let mut file = file.lock();
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&self, handle: StreamHandle, buf: &[u8]) -> Result<usize, HookError> {
        let file = self.file(handle)?;
        file.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn seek(&self, handle: StreamHandle, pos: SeekFrom) -> Result<u64, HookError> {
        let file = self.file(handle)?;
        let offset = file.lock().seek(pos)?;
        Ok(offset)
    }

    fn size(&self, handle: StreamHandle) -> Result<u64, HookError> {
        let file = self.file(handle)?;
        let len = file.lock().metadata()?.len();
        Ok(len)
    }
}
