//! C ABI for the validator. See `include/webp_validator.h`.

use libc::{c_char, size_t};
use std::{
    ffi::{CStr, CString},
    panic, ptr,
};

use crate::{Error, ValidateOptions, ValidationResult, validate, validate_file};

/// C-compatible validation result.
///
/// `error_message` is null when `is_valid` is true. Otherwise it owns a
/// NUL-terminated string that must be released with [`free_error_message`].
#[repr(C)]
#[derive(Debug)]
pub struct WebpValidationResult {
    pub is_valid: bool,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub is_animated: bool,
    pub num_frames: u32,
    pub error_message: *mut c_char,
}

impl From<ValidationResult> for WebpValidationResult {
    fn from(result: ValidationResult) -> Self {
        Self {
            is_valid: result.is_valid,
            width: result.width,
            height: result.height,
            has_alpha: result.has_alpha,
            is_animated: result.is_animated,
            num_frames: result.num_frames,
            error_message: result.error.map_or(ptr::null_mut(), into_c_string),
        }
    }
}

fn into_c_string(message: String) -> *mut c_char {
    let mut bytes = message.into_bytes();
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default().into_raw()
}

fn panicked() -> ValidationResult {
    ValidationResult {
        error: Some("internal error: validation panicked".to_string()),
        ..Default::default()
    }
}

/// Validate an in-memory WebP buffer.
///
/// # Safety
/// Caller must ensure:
/// 1. `data` points to `len` readable bytes for the duration of the call
/// 2. a non-null `error_message` in the result is freed with `free_error_message`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn validate_webp_ffi(data: *const u8, len: size_t) -> WebpValidationResult {
    let result = panic::catch_unwind(|| {
        if data.is_null() {
            return ValidationResult::invalid(&Error::NullPointer("data"));
        }
        let slice = unsafe { std::slice::from_raw_parts(data, len) };
        validate(slice)
    });

    result.unwrap_or_else(|_| panicked()).into()
}

/// Read a file and validate its contents.
///
/// # Safety
/// Caller must ensure:
/// 1. `path` is a valid NUL-terminated string
/// 2. a non-null `error_message` in the result is freed with `free_error_message`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn validate_webp_file_ffi(path: *const c_char) -> WebpValidationResult {
    let result = panic::catch_unwind(|| {
        if path.is_null() {
            return ValidationResult::invalid(&Error::NullPointer("path"));
        }
        let path = unsafe { CStr::from_ptr(path) };
        match path.to_str() {
            Ok(path) => validate_file(path, &ValidateOptions::default()).into(),
            Err(e) => ValidationResult::invalid(&Error::InvalidPath(e.to_string())),
        }
    });

    result.unwrap_or_else(|_| panicked()).into()
}

/// Free an error message returned by `validate_webp_ffi` or `validate_webp_file_ffi`.
///
/// Null is accepted and ignored.
///
/// # Safety
/// Caller must ensure:
/// 1. `error_message` was returned by one of the validation functions
/// 2. This function is called only once per pointer
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_error_message(error_message: *mut c_char) {
    if !error_message.is_null() {
        drop(unsafe { CString::from_raw(error_message) });
    }
}
