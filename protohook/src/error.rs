//! Host-side error type of the hook layer.
//!
//! Every variant collapses to `STATUS_FAILURE` when it crosses back to the
//! native side; the detail only ever reaches the log.

use std::fmt;
use std::os::raw::c_int;

use protocol_runtime::STATUS_FAILURE;

use crate::idgen::StreamHandle;

#[derive(Debug)]
pub enum HookError {
    /// No handler is installed for the protocol
    ProtocolNotRegistered(String),
    /// The native context carries no open stream
    NoStream,
    /// Operation on a handle that is not open
    NotOpen(StreamHandle),
    /// Open on a handle that is already open
    AlreadyOpen(StreamHandle),
    /// Native arguments that cannot be marshalled (null pointer, negative size, ...)
    InvalidArgument(String),
    /// The handler does not implement the operation
    Unsupported(&'static str),
    /// The underlying resource failed
    Io(std::io::Error),
}

impl HookError {
    /// What every failure looks like on the native side.
    pub const STATUS: c_int = STATUS_FAILURE;

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolNotRegistered(name) => write!(f, "No hook installed for protocol: {name}"),
            Self::NoStream => write!(f, "Context has no open stream"),
            Self::NotOpen(handle) => write!(f, "Stream not open: {handle}"),
            Self::AlreadyOpen(handle) => write!(f, "Stream already open: {handle}"),
            Self::InvalidArgument(message) => write!(f, "Invalid argument: {message}"),
            Self::Unsupported(op) => write!(f, "Operation not supported: {op}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HookError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
