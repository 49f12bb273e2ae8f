//! # webp-validator
//!
//! Structural validation for WebP files.
//!
//! This crate walks the RIFF container of a WebP file and the headers of the
//! chunks inside it, and reports whether the file is well formed together with
//! its canvas size, alpha and animation metadata. It never decodes pixels, so
//! it is cheap enough to run on every upload before handing the file to a real
//! decoder.
//!
//! ## Features
//!
//! - Validate WebP data from memory, files, or readers.
//! - Lossy (`VP8 `), lossless (`VP8L`) and extended (`VP8X`) layouts.
//! - Animation frame counting with per-frame bounds checks.
//! - Typed errors grouped into [`ErrorKind`] categories.
//! - A C ABI (`validate_webp_ffi`, `free_error_message`) for non-Rust callers.
//!
//! ## Examples
//!
//! ### Validating a file
//!
//! ```no_run
//! use webp_validator::{validate_file, Error, ValidateOptions};
//!
//! fn main() -> Result<(), Error> {
//!     let info = validate_file("upload.webp", &ValidateOptions::default())?;
//!
//!     println!("{}x{}, alpha: {}", info.width, info.height, info.has_alpha);
//!     if info.is_animated {
//!         println!("{} frames", info.num_frames);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Branching on the failure category
//!
//! ```no_run
//! use webp_validator::{validate_webp, ErrorKind};
//!
//! let data: &[u8] = &[/* ... uploaded bytes ... */];
//! match validate_webp(data) {
//!     Ok(info) => println!("accepted {}x{}", info.width, info.height),
//!     Err(e) if e.kind() == ErrorKind::Truncation => println!("incomplete upload: {e}"),
//!     Err(e) => println!("rejected: {e}"),
//! }
//! ```
//!
//! ### Flat result
//!
//! [`validate`] returns a [`ValidationResult`] with the same fields as the C
//! struct, which is convenient when the outcome is forwarded as-is:
//!
//! ```no_run
//! use webp_validator::validate;
//!
//! let data: &[u8] = &[/* ... */];
//! let result = validate(data);
//! if !result.is_valid {
//!     eprintln!("{}", result.error.unwrap_or_default());
//! }
//! ```
//!
//! ### Tighter limits
//!
//! ```no_run
//! use webp_validator::{validate_webp_with_options, ValidateOptions};
//!
//! let options = ValidateOptions {
//!     max_width: 4096,
//!     max_height: 4096,
//!     max_frames: Some(500),
//! };
//! let data: &[u8] = &[/* ... */];
//! let info = validate_webp_with_options(data, &options);
//! ```

mod types;
pub use types::*;

mod chunk;
pub use chunk::*;

pub mod bitstream;

mod validate;
pub use validate::*;

pub mod ffi;
pub use ffi::{WebpValidationResult, free_error_message, validate_webp_ffi, validate_webp_file_ffi};
