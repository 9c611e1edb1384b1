//! Encoder parameters and the effort floor policy.

use serde::{Deserialize, Serialize};

/// Highest quality value; quality 100 selects lossless mode.
pub const MAX_QUALITY: u8 = 100;

/// Highest effort (libwebp `method`) level.
pub const MAX_EFFORT: u8 = 6;

/// Effort used for final outputs and the lossless shortcut.
pub const FINAL_EFFORT: u8 = 5;

/// Images with either dimension at or above this are rejected.
pub const MAX_DIMENSION: u32 = 16_384;

/// Parameters for a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodeParameters {
    /// Quality 0-100. Ignored for compression ratio when `lossless` is set.
    pub quality: u8,
    /// Effort 0-6. Higher is slower and smaller.
    pub effort: u8,
    /// Emit a lossless bitstream.
    pub lossless: bool,
}

impl EncodeParameters {
    /// Lossy parameters.
    pub fn lossy(quality: u8, effort: u8) -> Self {
        Self {
            quality,
            effort,
            lossless: false,
        }
    }

    /// Lossless parameters at full quality.
    pub fn lossless(effort: u8) -> Self {
        Self {
            quality: MAX_QUALITY,
            effort,
            lossless: true,
        }
    }

    /// Parameters for fixed-quality mode, where quality 100 means lossless.
    pub fn for_quality(quality: u8, effort: u8) -> Self {
        let quality = quality.min(MAX_QUALITY);
        if quality == MAX_QUALITY {
            Self::lossless(effort)
        } else {
            Self::lossy(quality, effort)
        }
    }

    /// Same parameters one effort step higher, or `None` at the ceiling.
    pub fn escalated(self) -> Option<Self> {
        (self.effort < MAX_EFFORT).then(|| Self {
            effort: self.effort + 1,
            ..self
        })
    }
}

/// Lowest effort that libwebp encodes reliably at this pixel count.
///
/// Low `method` values overflow the first partition on very large images.
pub fn minimum_effort(pixel_count: u64) -> u8 {
    match pixel_count {
        0..=14_999_999 => 0,
        15_000_000..=34_999_999 => 1,
        35_000_000..=79_999_999 => 2,
        _ => 3,
    }
}

/// Effort floor for size-threshold mode, which never runs at effort 0.
pub fn minimum_threshold_effort(pixel_count: u64) -> u8 {
    minimum_effort(pixel_count).max(1)
}
