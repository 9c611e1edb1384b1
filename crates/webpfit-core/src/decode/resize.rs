//! Image resampling used by the downscale loop.
//!
//! All functions return new `DecodedImage` instances without modifying the input.

use image::DynamicImage;

use super::{DecodeError, DecodedImage, FilterType};

/// Resize an image to exact dimensions.
///
/// # Arguments
///
/// * `image` - The source image to resize
/// * `width` - Target width in pixels
/// * `height` - Target height in pixels
/// * `filter` - Interpolation filter to use
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` for a zero target dimension and
/// `DecodeError::CorruptedFile` if the source buffer does not match its dimensions.
pub fn resize(
    image: &DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let source = image
        .to_dynamic_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer does not match dimensions".to_string()))?;

    let resized = match source {
        DynamicImage::ImageRgba8(buf) => DecodedImage::from_rgba_image(image::imageops::resize(
            &buf,
            width,
            height,
            filter.to_image_filter(),
        )),
        other => DecodedImage::from_rgb_image(image::imageops::resize(
            &other.into_rgb8(),
            width,
            height,
            filter.to_image_filter(),
        )),
    };

    Ok(resized)
}

/// Dimensions of a `width`x`height` image scaled by `factor`, rounded, never below 1.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let scale = |edge: u32| ((edge as f64 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(width: u32, height: u32) -> DecodedImage {
        // Create a simple gradient image for testing
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8); // R
                pixels.push(((y * 255) / height.max(1)) as u8); // G
                pixels.push(128); // B
            }
        }
        DecodedImage::new(width, height, pixels)
    }

    #[test]
    fn test_resize_basic() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, 50, 25, FilterType::Bilinear).unwrap();

        assert_eq!(resized.width, 50);
        assert_eq!(resized.height, 25);
        assert_eq!(resized.pixels.len(), 50 * 25 * 3);
    }

    #[test]
    fn test_resize_same_dimensions_is_copy() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, 100, 50, FilterType::CatmullRom).unwrap();

        assert_eq!(resized, img);
    }

    #[test]
    fn test_resize_keeps_alpha() {
        let img = DecodedImage::new_rgba(40, 40, vec![200u8; 40 * 40 * 4]);
        let resized = resize(&img, 20, 20, FilterType::CatmullRom).unwrap();

        assert_eq!(resized.layout, crate::decode::PixelLayout::Rgba8);
        assert_eq!(resized.pixels.len(), 20 * 20 * 4);
    }

    #[test]
    fn test_resize_zero_dimensions_error() {
        let img = create_test_image(100, 50);

        assert!(matches!(
            resize(&img, 0, 50, FilterType::Bilinear),
            Err(DecodeError::InvalidDimensions { .. })
        ));
        assert!(resize(&img, 50, 0, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_resize_mismatched_buffer_error() {
        let img = DecodedImage {
            width: 10,
            height: 10,
            layout: crate::decode::PixelLayout::Rgb8,
            pixels: vec![0u8; 10],
        };

        assert!(matches!(
            resize(&img, 5, 5, FilterType::Bilinear),
            Err(DecodeError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_scaled_dimensions_rounds() {
        assert_eq!(scaled_dimensions(1000, 333, 0.9), (900, 300));
        assert_eq!(scaled_dimensions(1000, 800, 0.81), (810, 648));
    }

    #[test]
    fn test_scaled_dimensions_never_zero() {
        assert_eq!(scaled_dimensions(3, 1, 0.1), (1, 1));
        assert_eq!(scaled_dimensions(0, 0, 0.5), (0, 0));
    }
}
