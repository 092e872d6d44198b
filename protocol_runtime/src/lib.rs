pub mod context;
#[cfg(feature = "native")]
mod ffi_runtime;
#[cfg(feature = "native")]
mod native;
mod runtime_trait;

pub use context::{
    CallbackTable, CloseFn, OpenFn, ReadFn, SeekFn, UrlContext, WriteFn, FLAG_READ,
    FLAG_READ_WRITE, FLAG_TRUNCATE, FLAG_WRITE, NO_STREAM, SEEK_CUR, SEEK_END, SEEK_FORCE, SEEK_SET, SEEK_SIZE,
    STATUS_FAILURE,
};
#[cfg(feature = "native")]
pub use ffi_runtime::FfiProtocolRuntime;
#[cfg(feature = "native")]
pub use native::{install_protocol_hook, uninstall_protocol_hook};
pub use runtime_trait::ProtocolRuntime;
