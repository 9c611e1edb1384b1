//! webpfit Core - size-constrained WebP encoding
//!
//! This crate converts decoded images to WebP either at a fixed quality and
//! effort, or at the highest quality that fits a byte budget. The budget
//! search fits a monotone interpolant to a few sampled encode sizes to avoid
//! encoding every quality level, and falls back to downscaling when quality
//! alone cannot meet the budget.

pub mod convert;
pub mod decode;
pub mod encode;
pub mod predict;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use convert::{
    check_dimensions, convert, encode_at_quality, encode_under_threshold, ConversionMode,
    ConvertError, EncodedImage,
};
pub use decode::{decode_image, load_image, DecodeError, DecodedImage};
pub use encode::{EncodeError, EncodeParameters, Encoder, WebpEncoder};
pub use predict::{SizePredictor, SAMPLE_QUALITIES};
pub use search::ThresholdSearch;
