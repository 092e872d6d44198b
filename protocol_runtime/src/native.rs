use std::os::raw::{c_char, c_int};

use crate::context::CallbackTable;

extern "C" {
    pub fn install_protocol_hook(name_ptr: *const c_char, table: *const CallbackTable) -> c_int;
    pub fn uninstall_protocol_hook(name_ptr: *const c_char) -> c_int;
}
