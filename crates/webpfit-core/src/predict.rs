//! Encoded-size prediction using a monotone piecewise cubic Hermite interpolant (PCHIP).
//!
//! The predictor encodes the image at a handful of fixed qualities and fits a
//! shape-preserving curve through the measured sizes. Unlike a plain cubic
//! spline it never overshoots between samples, so it cannot report a quality as
//! over budget when both neighbouring samples are under it.

use rayon::prelude::*;
use thiserror::Error;

use crate::decode::DecodedImage;
use crate::encode::{encode_with_recovery, EncodeError, EncodeParameters, Encoder};

/// Qualities sampled to build a predictor.
pub const SAMPLE_QUALITIES: [u8; 5] = [15, 45, 80, 93, 99];

/// Errors from building a predictor.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("At least two samples are required, got {0}")]
    TooFewSamples(usize),

    #[error("Sample qualities must be strictly increasing ({previous} then {next})")]
    UnorderedSamples { previous: u8, next: u8 },

    #[error("Sample encode at quality {quality}, effort {effort} failed: {source}")]
    Encode {
        quality: u8,
        effort: u8,
        #[source]
        source: EncodeError,
    },
}

/// One measured (quality, encoded size) point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSample {
    pub quality: u8,
    pub size: u64,
}

/// Estimates encoded size at untried qualities for one image resolution.
#[derive(Debug, Clone)]
pub struct SizePredictor {
    samples: Vec<SizeSample>,
    tangents: Vec<f64>,
}

impl SizePredictor {
    /// Fit a predictor over measured samples.
    ///
    /// # Errors
    ///
    /// Fewer than two samples, or qualities that are not strictly increasing.
    pub fn from_samples(samples: Vec<SizeSample>) -> Result<Self, PredictError> {
        if samples.len() < 2 {
            return Err(PredictError::TooFewSamples(samples.len()));
        }
        if let Some(pair) = samples.windows(2).find(|w| w[0].quality >= w[1].quality) {
            return Err(PredictError::UnorderedSamples {
                previous: pair[0].quality,
                next: pair[1].quality,
            });
        }

        let tangents = pchip_tangents(&samples);
        Ok(Self { samples, tangents })
    }

    /// Encode `image` at every [`SAMPLE_QUALITIES`] entry in parallel and fit the result.
    ///
    /// Each sample goes through the single-retry corrupt recovery on its own.
    pub fn sample<E: Encoder + ?Sized>(
        encoder: &E,
        image: &DecodedImage,
        effort: u8,
    ) -> Result<Self, PredictError> {
        let samples = SAMPLE_QUALITIES
            .par_iter()
            .map(|&quality| {
                let (bytes, _) =
                    encode_with_recovery(encoder, image, EncodeParameters::lossy(quality, effort))
                        .map_err(|source| PredictError::Encode {
                            quality,
                            effort,
                            source,
                        })?;
                Ok(SizeSample {
                    quality,
                    size: bytes.len() as u64,
                })
            })
            .collect::<Result<Vec<_>, PredictError>>()?;

        tracing::trace!(?samples, width = image.width, height = image.height, "size predictor sampled");
        Self::from_samples(samples)
    }

    /// Measured samples, ordered by quality.
    pub fn samples(&self) -> &[SizeSample] {
        &self.samples
    }

    /// Estimated encoded size in bytes at `quality`.
    ///
    /// Qualities outside the sampled range are clamped to the nearest end.
    pub fn estimate(&self, quality: u8) -> f64 {
        let n = self.samples.len();
        let x = f64::from(quality).clamp(
            f64::from(self.samples[0].quality),
            f64::from(self.samples[n - 1].quality),
        );

        let i = find_interval(&self.samples, x);
        let (p0, p1) = (&self.samples[i], &self.samples[i + 1]);

        let h = f64::from(p1.quality) - f64::from(p0.quality);
        let t = (x - f64::from(p0.quality)) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        // Hermite basis functions
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0.size as f64
            + h10 * h * self.tangents[i]
            + h01 * p1.size as f64
            + h11 * h * self.tangents[i + 1]
    }
}

/// PCHIP derivatives: weighted harmonic mean in the interior, shape-preserving
/// three-point estimate at the ends.
fn pchip_tangents(samples: &[SizeSample]) -> Vec<f64> {
    let n = samples.len();

    let h: Vec<f64> = samples
        .windows(2)
        .map(|w| f64::from(w[1].quality) - f64::from(w[0].quality))
        .collect();
    let delta: Vec<f64> = samples
        .windows(2)
        .zip(&h)
        .map(|(w, h)| (w[1].size as f64 - w[0].size as f64) / h)
        .collect();

    if n == 2 {
        return vec![delta[0]; 2];
    }

    let mut m = vec![0.0; n];

    for i in 1..n - 1 {
        if delta[i - 1] * delta[i] <= 0.0 {
            m[i] = 0.0;
        } else {
            let w1 = 2.0 * h[i] + h[i - 1];
            let w2 = h[i] + 2.0 * h[i - 1];
            m[i] = (w1 + w2) / (w1 / delta[i - 1] + w2 / delta[i]);
        }
    }

    m[0] = end_tangent(h[0], h[1], delta[0], delta[1]);
    m[n - 1] = end_tangent(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);

    m
}

fn end_tangent(h0: f64, h1: f64, delta0: f64, delta1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * delta0 - h0 * delta1) / (h0 + h1);

    if d.signum() != delta0.signum() || delta0 == 0.0 {
        0.0
    } else if delta0.signum() != delta1.signum() && d.abs() > (3.0 * delta0).abs() {
        3.0 * delta0
    } else {
        d
    }
}

/// Binary search for the sample interval containing x.
fn find_interval(samples: &[SizeSample], x: f64) -> usize {
    let mut low = 0;
    let mut high = samples.len() - 2;

    while low < high {
        let mid = (low + high).div_ceil(2);
        if f64::from(samples[mid].quality) <= x {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    low
}


// ============================================================================
// Property-Based Tests
// ============================================================================
