pub mod config;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod file_hook;
pub mod hook;
pub mod idgen;
pub mod marshal;
pub mod mem_hook;
pub mod registry;

// Re-export the handler contract
pub use hook::{OpenFlags, ProtocolHook, SeekRequest};

// Re-export registry types
pub use registry::{InstallOutcome, ProtocolRegistry, UninstallOutcome};

// Re-export dispatch and ffi entry types
pub use dispatch::StreamSlot;
pub use ffi::{attach, AttachGuard, CALLBACKS};

// Re-export reference handlers
pub use file_hook::FileHook;
pub use mem_hook::{MemBuffer, MemHook};

pub use config::{BufferMode, ConfigError, HookConfig};
pub use error::HookError;
pub use idgen::{IdGen, StreamHandle};
