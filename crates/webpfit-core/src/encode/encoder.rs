//! The encoder capability consumed by the search.

use thiserror::Error;

use super::EncodeParameters;
use crate::decode::{self, DecodeError, DecodedImage, FilterType};

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Known encoder defect on large images at low effort.
    /// Recoverable by retrying once at the next effort level.
    #[error("Encoder produced a corrupt stream at effort {effort}")]
    Corrupt { effort: u8 },

    /// Any other encoder failure
    #[error("WebP encoding failed: {0}")]
    EncodingFailed(String),
}

impl EncodeError {
    /// Whether this is the corrupt-stream defect that a single effort escalation recovers.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, EncodeError::Corrupt { .. })
    }
}

/// An image encoder.
///
/// Implementations must be deterministic: identical images and parameters
/// produce identical bytes.
pub trait Encoder: Sync {
    /// Encode `image` with `params`.
    fn encode(&self, image: &DecodedImage, params: EncodeParameters) -> Result<Vec<u8>, EncodeError>;

    /// Resample `image` to exact dimensions.
    fn resample(&self, image: &DecodedImage, width: u32, height: u32) -> Result<DecodedImage, DecodeError> {
        decode::resize(image, width, height, FilterType::CatmullRom)
    }
}

/// Encode, retrying exactly once one effort step higher on [`EncodeError::Corrupt`].
///
/// Returns the bytes with the parameters that produced them. A second
/// failure, or a corrupt result at maximum effort, is returned as-is.
pub fn encode_with_recovery<E: Encoder + ?Sized>(
    encoder: &E,
    image: &DecodedImage,
    params: EncodeParameters,
) -> Result<(Vec<u8>, EncodeParameters), EncodeError> {
    match encoder.encode(image, params) {
        Ok(bytes) => Ok((bytes, params)),
        Err(err) if err.is_corrupt() => {
            let Some(retry) = params.escalated() else {
                return Err(err);
            };
            tracing::debug!(
                quality = params.quality,
                from = params.effort,
                to = retry.effort,
                "corrupt encode, retrying at higher effort"
            );
            encoder.encode(image, retry).map(|bytes| (bytes, retry))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gray_image, ScriptedEncoder};

    #[test]
    fn test_no_retry_on_success() {
        let encoder = ScriptedEncoder::linear();
        let image = gray_image(10, 10);

        let (bytes, params) =
            encode_with_recovery(&encoder, &image, EncodeParameters::lossy(50, 1)).unwrap();

        assert!(!bytes.is_empty());
        assert_eq!(params.effort, 1);
        assert_eq!(encoder.encode_count(), 1);
    }

    #[test]
    fn test_single_retry_on_corrupt() {
        let encoder = ScriptedEncoder::linear().corrupt_at_effort(1, 1);
        let image = gray_image(10, 10);

        let (_, params) =
            encode_with_recovery(&encoder, &image, EncodeParameters::lossy(50, 1)).unwrap();

        assert_eq!(params.effort, 2);
        assert_eq!(encoder.efforts(), vec![1, 2]);
    }

    #[test]
    fn test_second_corrupt_propagates() {
        let encoder = ScriptedEncoder::linear()
            .corrupt_at_effort(1, 1)
            .corrupt_at_effort(2, 1);
        let image = gray_image(10, 10);

        let result = encode_with_recovery(&encoder, &image, EncodeParameters::lossy(50, 1));

        assert!(matches!(result, Err(EncodeError::Corrupt { effort: 2 })));
        assert_eq!(encoder.efforts(), vec![1, 2]);
    }

    #[test]
    fn test_corrupt_at_max_effort_not_retried() {
        let encoder = ScriptedEncoder::linear().corrupt_at_effort(6, 1);
        let image = gray_image(10, 10);

        let result = encode_with_recovery(&encoder, &image, EncodeParameters::lossy(50, 6));

        assert!(matches!(result, Err(EncodeError::Corrupt { .. })));
        assert_eq!(encoder.encode_count(), 1);
    }

    #[test]
    fn test_other_errors_not_retried() {
        let encoder = ScriptedEncoder::linear().fail_with_message("unreadable");
        let image = gray_image(10, 10);

        let result = encode_with_recovery(&encoder, &image, EncodeParameters::lossy(50, 1));

        assert!(matches!(result, Err(EncodeError::EncodingFailed(_))));
        assert_eq!(encoder.encode_count(), 1);
    }

    #[test]
    fn test_default_resample() {
        let encoder = ScriptedEncoder::linear();
        let image = gray_image(20, 10);

        let resampled = encoder.resample(&image, 10, 5).unwrap();

        assert_eq!((resampled.width, resampled.height), (10, 5));
    }
}
