//! Conversion entry points: fixed quality, or best quality under a byte budget.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{DecodeError, DecodedImage};
use crate::encode::{
    encode_with_recovery, minimum_effort, EncodeError, EncodeParameters, Encoder, FINAL_EFFORT,
    MAX_DIMENSION, MAX_EFFORT,
};
use crate::predict::PredictError;
use crate::search::ThresholdSearch;

/// Errors that end a single image conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Either dimension is at or above [`MAX_DIMENSION`].
    #[error("Image {width}x{height} is too large (limit is {limit} pixels per side)", limit = MAX_DIMENSION)]
    ImageTooLarge { width: u32, height: u32 },

    /// A byte budget of zero can never be met.
    #[error("Size threshold must be a positive number of bytes")]
    InvalidThreshold,

    /// Every allowed quality and downscale exceeded the budget.
    #[error("Could not fit image under {threshold} bytes after {downscales} downscale attempts")]
    ThresholdUnattainable { threshold: u64, downscales: u32 },

    /// A fatal encoder failure, with the parameters and resolution that failed.
    #[error("Encoding {width}x{height} at quality {quality}, effort {effort} failed: {source}")]
    Encode {
        quality: u8,
        effort: u8,
        width: u32,
        height: u32,
        #[source]
        source: EncodeError,
    },

    /// Downscaling the source image failed.
    #[error("Resampling failed: {0}")]
    Resample(#[from] DecodeError),

    /// The size predictor could not be built.
    #[error("Size prediction failed: {0}")]
    Predictor(#[source] PredictError),
}

impl ConvertError {
    pub(crate) fn encode(params: EncodeParameters, image: &DecodedImage, source: EncodeError) -> Self {
        ConvertError::Encode {
            quality: params.quality,
            effort: params.effort,
            width: image.width,
            height: image.height,
            source,
        }
    }

    pub(crate) fn predictor(err: PredictError, image: &DecodedImage) -> Self {
        match err {
            PredictError::Encode {
                quality,
                effort,
                source,
            } => ConvertError::Encode {
                quality,
                effort,
                width: image.width,
                height: image.height,
                source,
            },
            other => ConvertError::Predictor(other),
        }
    }
}

/// Encoded output with the parameters and resolution that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// WebP bytes.
    pub data: Vec<u8>,
    /// Parameters of the encode that produced `data`.
    pub params: EncodeParameters,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Number of downscale steps applied; 0 means full resolution.
    pub downscales: u32,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// How a conversion chooses its encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConversionMode {
    /// Fixed quality (100 = lossless) and effort.
    Quality { quality: u8, effort: u8 },
    /// Highest quality whose output fits in `max_bytes`.
    SizeLimit { max_bytes: u64, allow_downscale: bool },
}

impl Default for ConversionMode {
    fn default() -> Self {
        ConversionMode::Quality {
            quality: 80,
            effort: FINAL_EFFORT,
        }
    }
}

/// Reject images libwebp cannot represent before any encode work.
pub fn check_dimensions(image: &DecodedImage) -> Result<(), ConvertError> {
    if image.width >= MAX_DIMENSION || image.height >= MAX_DIMENSION {
        return Err(ConvertError::ImageTooLarge {
            width: image.width,
            height: image.height,
        });
    }
    Ok(())
}

/// Encode at a fixed quality and effort.
///
/// Quality 100 produces lossless output. Quality above 100 and effort above
/// [`MAX_EFFORT`] are clamped; effort below the pixel-count floor is raised to it.
///
/// # Errors
///
/// `ImageTooLarge` before any encode, or `Encode` if the encoder fails after
/// its single corrupt-stream retry.
pub fn encode_at_quality<E: Encoder + ?Sized>(
    encoder: &E,
    image: &DecodedImage,
    quality: u8,
    effort: u8,
) -> Result<EncodedImage, ConvertError> {
    check_dimensions(image)?;

    let effort = effort.min(MAX_EFFORT).max(minimum_effort(image.pixel_count()));
    let params = EncodeParameters::for_quality(quality, effort);

    let (data, params) = encode_with_recovery(encoder, image, params)
        .map_err(|source| ConvertError::encode(params, image, source))?;

    Ok(EncodedImage {
        data,
        params,
        width: image.width,
        height: image.height,
        downscales: 0,
    })
}

/// Encode at the highest quality whose output fits in `threshold` bytes,
/// downscaling when `allow_downscale` is set and quality alone is not enough.
///
/// # Errors
///
/// `InvalidThreshold` for zero, `ImageTooLarge` before any encode,
/// `ThresholdUnattainable` once the search is exhausted, or any fatal encoder error.
pub fn encode_under_threshold<E: Encoder + ?Sized>(
    encoder: &E,
    image: &DecodedImage,
    threshold: u64,
    allow_downscale: bool,
) -> Result<EncodedImage, ConvertError> {
    if threshold == 0 {
        return Err(ConvertError::InvalidThreshold);
    }
    ThresholdSearch::new(encoder, threshold, allow_downscale).run(image)
}

/// Convert `image` according to `mode`.
pub fn convert<E: Encoder + ?Sized>(
    encoder: &E,
    image: &DecodedImage,
    mode: &ConversionMode,
) -> Result<EncodedImage, ConvertError> {
    match *mode {
        ConversionMode::Quality { quality, effort } => {
            encode_at_quality(encoder, image, quality, effort)
        }
        ConversionMode::SizeLimit {
            max_bytes,
            allow_downscale,
        } => encode_under_threshold(encoder, image, max_bytes, allow_downscale),
    }
}
