use std::os::raw::c_int;

use crate::context::CallbackTable;

/// Trait for the native side of protocol hooking.
/// Abstracts the framework's protocol table so the registry can run against the
/// real library (FFI) or an in-process table (tests, CLI).
pub trait ProtocolRuntime: Send + Sync {
    /// Point the callbacks of protocol `name` at `table`, keeping the originals.
    /// Returns 0 on success, -1 if the protocol is unknown or already hooked.
    fn register_protocol(&self, name: &str, table: &CallbackTable) -> c_int;

    /// Restore the original callbacks of protocol `name`.
    /// Returns 0 on success, -1 if the protocol is unknown or not hooked.
    fn unregister_protocol(&self, name: &str) -> c_int;
}
