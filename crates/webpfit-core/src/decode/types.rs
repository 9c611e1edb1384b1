//! Core types for decoded images.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding and resampling operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// Requested resample target has a zero dimension.
    #[error("Invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Catmull-Rom cubic spline interpolation.
    #[default]
    CatmullRom,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Channel layout of a decoded pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 3 bytes per pixel.
    #[default]
    Rgb8,
    /// 4 bytes per pixel, straight alpha.
    Rgba8,
}

impl PixelLayout {
    /// Bytes used by one pixel in this layout.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// A decoded image with 8-bit RGB or RGBA pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Channel layout of `pixels`.
    pub layout: PixelLayout,
    /// Pixel data in row-major order.
    /// Length should be width * height * layout.bytes_per_pixel().
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Create a new RGB image with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::with_layout(width, height, PixelLayout::Rgb8, pixels)
    }

    /// Create a new RGBA image with the given dimensions and pixel data.
    pub fn new_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::with_layout(width, height, PixelLayout::Rgba8, pixels)
    }

    fn with_layout(width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * layout.bytes_per_pixel(),
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            layout,
            pixels,
        }
    }

    /// Create a DecodedImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            pixels: img.into_raw(),
        }
    }

    /// Create a DecodedImage from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            pixels: img.into_raw(),
        }
    }

    /// Convert to an image::DynamicImage for further processing.
    pub fn to_dynamic_image(&self) -> Option<image::DynamicImage> {
        match self.layout {
            PixelLayout::Rgb8 => {
                image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
                    .map(image::DynamicImage::ImageRgb8)
            }
            PixelLayout::Rgba8 => {
                image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                    .map(image::DynamicImage::ImageRgba8)
            }
        }
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Expected pixel buffer length for the declared dimensions and layout.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
