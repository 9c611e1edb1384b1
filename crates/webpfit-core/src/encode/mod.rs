//! WebP encoding for webpfit.
//!
//! This module provides:
//! - The [`Encoder`] capability the search is written against
//! - [`WebpEncoder`], the libwebp-backed implementation
//! - The effort floor policy and the single-retry corrupt-stream recovery
//!
//! # Examples
//!
//! ```ignore
//! use webpfit_core::encode::{EncodeParameters, Encoder, WebpEncoder};
//!
//! let pixels = vec![128u8; 100 * 100 * 3];
//! let image = webpfit_core::decode::DecodedImage::new(100, 100, pixels);
//! let bytes = WebpEncoder.encode(&image, EncodeParameters::lossy(80, 4)).unwrap();
//! println!("Encoded {} bytes", bytes.len());
//! ```

mod encoder;
mod params;
mod webp_encoder;

pub use encoder::{encode_with_recovery, EncodeError, Encoder};
pub use params::{
    minimum_effort, minimum_threshold_effort, EncodeParameters, FINAL_EFFORT, MAX_DIMENSION,
    MAX_EFFORT, MAX_QUALITY,
};
pub use webp_encoder::{encode_webp, WebpEncoder};
