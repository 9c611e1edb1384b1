//! Source image loading with EXIF orientation handling.

use std::io::Cursor;
use std::path::Path;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, DecodedImage, Orientation};

/// Decode an image from bytes in any enabled format, applying EXIF orientation.
///
/// Images with an alpha channel decode to RGBA8, everything else to RGB8.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the format cannot be recognized and
/// `DecodeError::CorruptedFile` if decoding fails.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    let orientation = extract_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    Ok(into_decoded(apply_orientation(img, orientation)))
}

/// Read and decode an image file.
///
/// # Errors
///
/// Returns `DecodeError::IoError` if the file cannot be read, otherwise the
/// errors of [`decode_image`].
pub fn load_image(path: impl AsRef<Path>) -> Result<DecodedImage, DecodeError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| DecodeError::IoError(e.to_string()))?;
    decode_image(&bytes)
}

fn into_decoded(img: DynamicImage) -> DecodedImage {
    if img.color().has_alpha() {
        DecodedImage::from_rgba_image(img.into_rgba8())
    } else {
        DecodedImage::from_rgb_image(img.into_rgb8())
    }
}

/// Extract EXIF orientation from container bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
