use std::sync::atomic::{AtomicI64, Ordering};

use protocol_runtime::NO_STREAM;

/// Host-side identity of one open stream.
///
/// Minted at open, stored in the native context and handed back on every
/// later call of the same stream. Never equal to `NO_STREAM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle {
    id: i64,
}

impl StreamHandle {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Decode the token stored in a native context.
    #[must_use]
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw == NO_STREAM {
            None
        } else {
            Some(Self::new(raw))
        }
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Thread-safe ID generator
#[derive(Debug)]
pub struct IdGen {
    next_id: AtomicI64,
}

impl IdGen {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(NO_STREAM + 1),
        }
    }

    /// Get the next unique ID
    pub fn get_next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_handle(&self) -> StreamHandle {
        StreamHandle::new(self.get_next())
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
