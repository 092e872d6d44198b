pub mod stream;
pub mod table;

pub use stream::NativeStream;
pub use table::{
    builtin_callbacks, NativeTable, BUILTIN_STATUS, EBUSY, EINVAL, ENOENT, ENOSPC, ENOSYS,
    MAX_HOOKS,
};
