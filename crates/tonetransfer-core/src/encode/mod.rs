//! Writing the transferred raster at the pipeline boundary.
//!
//! The destination format is chosen by the caller, usually from the
//! destination path's extension. JPEG output takes a quality setting; the
//! other formats are lossless.
//!
//! # Examples
//!
//! ```ignore
//! use tonetransfer_core::encode::encode_image_file;
//!
//! encode_image_file(&result, Path::new("out/result.jpg"), 92)?;
//! ```

mod file;

pub use file::{encode_image, encode_image_file, EncodeError, OutputFormat};
