//! Loading rasters at the pipeline boundary.
//!
//! This module provides functionality for:
//! - Decoding PNG/JPEG/BMP/TIFF files into 8-bit RGB rasters
//! - Applying EXIF orientation so statistics are computed upright
//! - Resampling the reference onto the target's pixel grid
//!
//! # Examples
//!
//! ```ignore
//! use tonetransfer_core::decode::decode_image_file;
//!
//! let image = decode_image_file(Path::new("photo.jpg"))?;
//! println!("Decoded {}x{} image", image.width, image.height);
//! ```

mod file;
mod resize;
mod types;

pub use file::{decode_image, decode_image_file};
pub use resize::{match_dimensions, resize};
pub use types::{DecodeError, FilterType, Orientation, Raster};
