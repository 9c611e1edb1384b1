//! Image loading and resampling for webpfit.
//!
//! This module provides functionality for:
//! - Decoding source images (any format enabled on the `image` crate)
//! - Applying EXIF orientation on load
//! - Resampling images for the downscale loop
//!
//! # Examples
//!
//! ```ignore
//! use webpfit_core::decode::load_image;
//!
//! let image = load_image("photo.jpg").unwrap();
//! println!("Decoded {}x{} image", image.width, image.height);
//! ```

mod load;
mod resize;
mod types;

pub use load::{decode_image, load_image};
pub use resize::{resize, scaled_dimensions};
pub use types::{DecodeError, DecodedImage, FilterType, Orientation, PixelLayout};
