//! Conversions between native call arguments and host values.
//!
//! Strings are always copied out. Buffers become slices of exactly the
//! requested length (capped by `max_transfer`) that live no longer than the
//! call that produced them.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use crate::error::HookError;

/// Copy a NUL-terminated native string into an owned `String`.
/// Invalid UTF-8 is replaced. Returns `None` for a null pointer.
///
/// # Safety
/// `ptr` is null or points to a NUL-terminated string valid for this call.
#[must_use]
pub unsafe fn copy_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn bounded_len(size: c_int, cap: usize) -> Result<usize, HookError> {
    let len = usize::try_from(size).map_err(|_| HookError::invalid(format!("negative size {size}")))?;
    Ok(len.min(cap))
}

/// View a native read target of `size` bytes, capped at `cap`.
///
/// # Safety
/// If `size > 0`, `buf` is null or valid for writes of `size` bytes for the
/// lifetime `'a`, and nothing else accesses that memory meanwhile.
///
/// # Errors
/// Negative size, or a null buffer with a non-zero size.
pub unsafe fn read_target<'a>(buf: *mut u8, size: c_int, cap: usize) -> Result<&'a mut [u8], HookError> {
    let len = bounded_len(size, cap)?;
    if len == 0 {
        return Ok(&mut []);
    }
    if buf.is_null() {
        return Err(HookError::invalid("null read buffer"));
    }
    Ok(unsafe { std::slice::from_raw_parts_mut(buf, len) })
}

/// View a native write source of `size` bytes, capped at `cap`.
///
/// # Safety
/// If `size > 0`, `buf` is null or valid for reads of `size` bytes for the
/// lifetime `'a`.
///
/// # Errors
/// Negative size, or a null buffer with a non-zero size.
pub unsafe fn write_source<'a>(buf: *const u8, size: c_int, cap: usize) -> Result<&'a [u8], HookError> {
    let len = bounded_len(size, cap)?;
    if len == 0 {
        return Ok(&[]);
    }
    if buf.is_null() {
        return Err(HookError::invalid("null write buffer"));
    }
    Ok(unsafe { std::slice::from_raw_parts(buf, len) })
}

/// Byte count as a native status. Never negative.
#[must_use]
pub fn count_to_status(n: usize) -> c_int {
    c_int::try_from(n).unwrap_or(c_int::MAX)
}

/// Stream offset as a native seek result.
///
/// # Errors
/// The offset does not fit the native signed type.
pub fn offset_to_status(offset: u64) -> Result<i64, HookError> {
    i64::try_from(offset).map_err(|_| HookError::invalid(format!("offset {offset} out of range")))
}
