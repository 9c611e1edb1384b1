//! WebP encoding through libwebp.
//!
//! Lossy output maps `quality` to libwebp's quality factor; lossless output
//! sets the lossless flag and uses quality 100. `effort` is libwebp's `method`.

use libwebp_sys::WebPEncodingError;

use super::{EncodeError, EncodeParameters, Encoder, MAX_EFFORT, MAX_QUALITY};
use crate::decode::{DecodedImage, PixelLayout};

/// Production encoder backed by libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpEncoder;

impl WebpEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for WebpEncoder {
    fn encode(&self, image: &DecodedImage, params: EncodeParameters) -> Result<Vec<u8>, EncodeError> {
        encode_webp(image, params)
    }
}

/// Encode a decoded image to WebP bytes.
///
/// # Errors
///
/// * `InvalidDimensions` / `InvalidPixelData` for malformed input
/// * `Corrupt` when libwebp overflows a partition, which happens on large
///   images at low effort
/// * `EncodingFailed` for any other libwebp failure
pub fn encode_webp(image: &DecodedImage, params: EncodeParameters) -> Result<Vec<u8>, EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let expected = image.expected_len();
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    let encoder = match image.layout {
        PixelLayout::Rgb8 => webp::Encoder::from_rgb(&image.pixels, image.width, image.height),
        PixelLayout::Rgba8 => webp::Encoder::from_rgba(&image.pixels, image.width, image.height),
    };

    let mut config = webp::WebPConfig::new()
        .map_err(|_| EncodeError::EncodingFailed("failed to create WebPConfig".to_string()))?;

    let effort = params.effort.min(MAX_EFFORT);
    config.method = i32::from(effort);
    if params.lossless {
        config.lossless = 1;
        config.quality = f32::from(MAX_QUALITY);
    } else {
        config.lossless = 0;
        config.quality = f32::from(params.quality.min(MAX_QUALITY));
    }

    let encoded = encoder.encode_advanced(&config).map_err(|err| match err {
        WebPEncodingError::VP8_ENC_ERROR_PARTITION0_OVERFLOW
        | WebPEncodingError::VP8_ENC_ERROR_PARTITION_OVERFLOW => EncodeError::Corrupt { effort },
        other => EncodeError::EncodingFailed(format!("{other:?}")),
    })?;

    Ok(encoded.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> DecodedImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width) as u8);
                pixels.push(((y * 255) / height) as u8);
                pixels.push(((x ^ y) & 0xFF) as u8);
            }
        }
        DecodedImage::new(width, height, pixels)
    }

    fn is_webp(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
    }

    #[test]
    fn test_encode_webp_basic() {
        let image = gradient(64, 64);

        let bytes = encode_webp(&image, EncodeParameters::lossy(80, 4)).unwrap();

        assert!(is_webp(&bytes));
    }

    #[test]
    fn test_encode_webp_lossless_chunk() {
        let image = gradient(32, 32);

        let bytes = encode_webp(&image, EncodeParameters::lossless(5)).unwrap();

        assert!(is_webp(&bytes));
        assert_eq!(&bytes[12..16], b"VP8L");
    }

    #[test]
    fn test_encode_webp_lossy_chunk() {
        let image = gradient(32, 32);

        let bytes = encode_webp(&image, EncodeParameters::lossy(75, 4)).unwrap();

        assert_eq!(&bytes[12..16], b"VP8 ");
    }

    #[test]
    fn test_encode_webp_rgba() {
        let image = DecodedImage::new_rgba(16, 16, vec![90u8; 16 * 16 * 4]);

        let bytes = encode_webp(&image, EncodeParameters::lossy(80, 4)).unwrap();

        assert!(is_webp(&bytes));
    }

    #[test]
    fn test_encode_webp_quality_affects_size() {
        let image = gradient(128, 128);

        let low = encode_webp(&image, EncodeParameters::lossy(15, 4)).unwrap();
        let high = encode_webp(&image, EncodeParameters::lossy(95, 4)).unwrap();

        assert!(high.len() > low.len());
    }

    #[test]
    fn test_encode_webp_invalid_pixel_data() {
        let image = DecodedImage {
            width: 10,
            height: 10,
            layout: PixelLayout::Rgb8,
            pixels: vec![0u8; 299],
        };

        let result = encode_webp(&image, EncodeParameters::lossy(80, 4));
        assert!(matches!(result, Err(EncodeError::InvalidPixelData { expected: 300, actual: 299 })));
    }

    #[test]
    fn test_encode_webp_zero_dimensions() {
        let image = DecodedImage {
            width: 0,
            height: 10,
            layout: PixelLayout::Rgb8,
            pixels: vec![],
        };

        let result = encode_webp(&image, EncodeParameters::lossy(80, 4));
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
