use crate::context::{CallbackTable, STATUS_FAILURE};
use crate::native::{install_protocol_hook, uninstall_protocol_hook};
use crate::runtime_trait::ProtocolRuntime;
use std::ffi::CString;
use std::os::raw::c_int;

/// FFI-based implementation of `ProtocolRuntime`.
/// Uses the C functions exported by the native framework glue.
pub struct FfiProtocolRuntime;

impl FfiProtocolRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfiProtocolRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolRuntime for FfiProtocolRuntime {
    fn register_protocol(&self, name: &str, table: &CallbackTable) -> c_int {
        let Ok(c_name) = CString::new(name) else {
            return STATUS_FAILURE; // Invalid name (contains null byte)
        };
        unsafe { install_protocol_hook(c_name.as_ptr(), std::ptr::from_ref(table)) }
    }

    fn unregister_protocol(&self, name: &str) -> c_int {
        let Ok(c_name) = CString::new(name) else {
            return STATUS_FAILURE; // Invalid name (contains null byte)
        };
        unsafe { uninstall_protocol_hook(c_name.as_ptr()) }
    }
}
