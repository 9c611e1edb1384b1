//! Size-constrained quality search.
//!
//! For each resolution the search:
//! 1. samples the encoder to build a [`SizePredictor`]
//! 2. tries a lossless encode when the prediction says the budget is generous
//! 3. walks quality down, skipping levels the predictor rules out, and
//!    verifies the first plausible level with a real encode
//! 4. re-encodes that level at [`FINAL_EFFORT`] and walks quality back up
//!    until the next step would reach the budget
//!
//! If no quality fits and downscaling is allowed, the original image is
//! resampled to `0.9^n` of its size and the search repeats, up to
//! [`MAX_DOWNSCALES`] times.

use std::borrow::Cow;

use crate::convert::{check_dimensions, ConvertError, EncodedImage};
use crate::decode::{scaled_dimensions, DecodedImage};
use crate::encode::{
    encode_with_recovery, minimum_threshold_effort, EncodeParameters, Encoder, FINAL_EFFORT,
};
use crate::predict::SizePredictor;

/// Lowest quality the search will use.
pub const MIN_SEARCH_QUALITY: u8 = 15;

/// Highest lossy quality the search will use.
pub const MAX_SEARCH_QUALITY: u8 = 99;

/// Starting quality once the image has been downscaled.
///
/// This is a heuristic, not a bound: a fitting quality above 25 on a
/// downscaled attempt is only found through the upward walk.
pub const DOWNSCALED_START_QUALITY: u8 = 25;

/// Per-attempt linear scale step, applied to the original resolution.
pub const DOWNSCALE_FACTOR: f64 = 0.9;

/// Maximum number of downscale attempts after the full-resolution pass.
pub const MAX_DOWNSCALES: u32 = 15;

/// Searches for the highest-quality encode that fits a byte budget.
pub struct ThresholdSearch<'a, E: ?Sized> {
    encoder: &'a E,
    threshold: u64,
    allow_downscale: bool,
}

/// Working state for one resolution attempt.
struct SearchState<'img> {
    attempt: u32,
    image: Cow<'img, DecodedImage>,
    predictor: SizePredictor,
    /// Effort for probe encodes; only ever raised within an attempt.
    effort: u8,
}

/// One real encode and the parameters that produced it.
struct Candidate {
    data: Vec<u8>,
    params: EncodeParameters,
}

impl Candidate {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl<'a, E: Encoder + ?Sized> ThresholdSearch<'a, E> {
    pub fn new(encoder: &'a E, threshold: u64, allow_downscale: bool) -> Self {
        Self {
            encoder,
            threshold,
            allow_downscale,
        }
    }

    /// Run the search on `original`.
    ///
    /// # Errors
    ///
    /// `ImageTooLarge` before any encode, `ThresholdUnattainable` when every
    /// attempt is exhausted, or the first fatal encoder/resample error.
    pub fn run(&self, original: &DecodedImage) -> Result<EncodedImage, ConvertError> {
        check_dimensions(original)?;

        let last_attempt = if self.allow_downscale { MAX_DOWNSCALES } else { 0 };
        let mut previous = None;

        for attempt in 0..=last_attempt {
            let (width, height) = attempt_dimensions(original, attempt);
            let _span = tracing::debug_span!("attempt", attempt, width, height).entered();

            // Rounding repeats sizes on small images; a repeat cannot fit either.
            if previous == Some((width, height)) {
                tracing::debug!("same size as previous attempt, skipped");
                continue;
            }
            previous = Some((width, height));

            let mut state = self.prepare(original, attempt, width, height)?;

            if let Some(found) = self.search_resolution(&mut state)? {
                tracing::debug!(
                    quality = found.params.quality,
                    effort = found.params.effort,
                    lossless = found.params.lossless,
                    size = found.size(),
                    "fits threshold"
                );
                return Ok(EncodedImage {
                    data: found.data,
                    params: found.params,
                    width,
                    height,
                    downscales: attempt,
                });
            }
        }

        Err(ConvertError::ThresholdUnattainable {
            threshold: self.threshold,
            downscales: last_attempt,
        })
    }

    /// Build the image and predictor for an attempt. Attempt 0 borrows the
    /// original; later attempts resample from the original, never from a
    /// previous downscale.
    fn prepare<'img>(
        &self,
        original: &'img DecodedImage,
        attempt: u32,
        width: u32,
        height: u32,
    ) -> Result<SearchState<'img>, ConvertError> {
        let image = if attempt == 0 {
            Cow::Borrowed(original)
        } else {
            Cow::Owned(self.encoder.resample(original, width, height)?)
        };

        let effort = minimum_threshold_effort(image.pixel_count());
        let predictor = SizePredictor::sample(self.encoder, &image, effort)
            .map_err(|err| ConvertError::predictor(err, &image))?;

        Ok(SearchState {
            attempt,
            image,
            predictor,
            effort,
        })
    }

    fn search_resolution(&self, state: &mut SearchState<'_>) -> Result<Option<Candidate>, ConvertError> {
        if let Some(lossless) = self.try_lossless(state)? {
            return Ok(Some(lossless));
        }

        let start = if state.attempt == 0 {
            MAX_SEARCH_QUALITY
        } else {
            DOWNSCALED_START_QUALITY
        };

        for quality in (MIN_SEARCH_QUALITY..=start).rev() {
            let at_floor = quality == MIN_SEARCH_QUALITY;

            if !at_floor && state.predictor.estimate(quality) > self.threshold as f64 {
                continue;
            }

            let probe = self.encode(state, EncodeParameters::lossy(quality, state.effort))?;
            state.effort = probe.params.effort;
            tracing::trace!(quality, effort = state.effort, size = probe.size(), "probe");

            if probe.size() > self.threshold && !at_floor {
                continue;
            }

            let refined = self.encode(
                state,
                EncodeParameters::lossy(quality, FINAL_EFFORT.max(state.effort)),
            )?;
            if refined.size() > self.threshold {
                tracing::trace!(quality, size = refined.size(), "final effort exceeds threshold");
                continue;
            }

            return self.climb(state, refined).map(Some);
        }

        Ok(None)
    }

    /// Lossless encode when the lossy prediction at quality 99 is under half the budget.
    fn try_lossless(&self, state: &SearchState<'_>) -> Result<Option<Candidate>, ConvertError> {
        if state.predictor.estimate(MAX_SEARCH_QUALITY) * 2.0 >= self.threshold as f64 {
            return Ok(None);
        }

        let candidate = self.encode(state, EncodeParameters::lossless(FINAL_EFFORT))?;
        tracing::trace!(size = candidate.size(), "lossless shortcut");

        Ok((candidate.size() < self.threshold).then_some(candidate))
    }

    /// Step quality up from a fitting encode until the next step reaches the threshold.
    fn climb(&self, state: &SearchState<'_>, fitting: Candidate) -> Result<Candidate, ConvertError> {
        let mut best = fitting;

        for quality in best.params.quality + 1..=MAX_SEARCH_QUALITY {
            let next = self.encode(state, EncodeParameters::lossy(quality, best.params.effort))?;
            if next.size() >= self.threshold {
                break;
            }
            best = next;
        }

        Ok(best)
    }

    fn encode(&self, state: &SearchState<'_>, params: EncodeParameters) -> Result<Candidate, ConvertError> {
        encode_with_recovery(self.encoder, &state.image, params)
            .map(|(data, params)| Candidate { data, params })
            .map_err(|source| ConvertError::encode(params, &state.image, source))
    }
}

/// Target size for an attempt: the original, then `0.9^n` of it.
fn attempt_dimensions(original: &DecodedImage, attempt: u32) -> (u32, u32) {
    if attempt == 0 {
        return (original.width, original.height);
    }
    let factor = DOWNSCALE_FACTOR.powi(attempt as i32);
    scaled_dimensions(original.width, original.height, factor)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
