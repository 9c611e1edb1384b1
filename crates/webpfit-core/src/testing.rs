//! Deterministic fake encoder for search tests.

use std::sync::Mutex;

use crate::decode::{self, DecodeError, DecodedImage, FilterType};
use crate::encode::{EncodeError, EncodeParameters, Encoder};

type SizeFn = dyn Fn(&DecodedImage, EncodeParameters) -> usize + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Encode {
        width: u32,
        height: u32,
        params: EncodeParameters,
    },
    Resample {
        from: (u32, u32),
        width: u32,
        height: u32,
    },
}

/// Remaining corrupt failures for an effort, optionally limited to one quality.
struct CorruptRule {
    quality: Option<u8>,
    effort: u8,
    remaining: usize,
}

/// Encoder returning scripted sizes, filled with the quality byte.
pub(crate) struct ScriptedEncoder {
    size: Box<SizeFn>,
    corrupt: Mutex<Vec<CorruptRule>>,
    failure: Option<String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedEncoder {
    pub(crate) fn with_size(
        size: impl Fn(&DecodedImage, EncodeParameters) -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            size: Box::new(size),
            corrupt: Mutex::new(Vec::new()),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Size grows linearly with quality and pixel count, shrinks slightly with effort.
    /// Lossless is 16 bytes per pixel.
    pub(crate) fn linear() -> Self {
        Self::with_size(linear_size)
    }

    /// Fail `times` encodes at `effort` with `EncodeError::Corrupt`.
    pub(crate) fn corrupt_at_effort(self, effort: u8, times: usize) -> Self {
        self.push_corrupt(None, effort, times)
    }

    /// Fail `times` encodes at exactly `quality` and `effort`.
    pub(crate) fn corrupt_at(self, quality: u8, effort: u8, times: usize) -> Self {
        self.push_corrupt(Some(quality), effort, times)
    }

    fn push_corrupt(self, quality: Option<u8>, effort: u8, remaining: usize) -> Self {
        self.corrupt.lock().unwrap().push(CorruptRule {
            quality,
            effort,
            remaining,
        });
        self
    }

    /// Fail every encode with `EncodeError::EncodingFailed`.
    pub(crate) fn fail_with_message(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn encodes(&self) -> Vec<EncodeParameters> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Encode { params, .. } => Some(params),
                Call::Resample { .. } => None,
            })
            .collect()
    }

    pub(crate) fn resample_sources(&self) -> Vec<(u32, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Resample { from, .. } => Some(from),
                Call::Encode { .. } => None,
            })
            .collect()
    }

    /// Encodes performed on an image of the given dimensions, in call order.
    pub(crate) fn encodes_at(&self, dimensions: (u32, u32)) -> Vec<EncodeParameters> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Encode {
                    width,
                    height,
                    params,
                } if (width, height) == dimensions => Some(params),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn encode_count(&self) -> usize {
        self.encodes().len()
    }

    pub(crate) fn efforts(&self) -> Vec<u8> {
        self.encodes().iter().map(|p| p.effort).collect()
    }

    pub(crate) fn resamples(&self) -> Vec<(u32, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Resample { width, height, .. } => Some((width, height)),
                Call::Encode { .. } => None,
            })
            .collect()
    }
}

impl Encoder for ScriptedEncoder {
    fn encode(&self, image: &DecodedImage, params: EncodeParameters) -> Result<Vec<u8>, EncodeError> {
        self.calls.lock().unwrap().push(Call::Encode {
            width: image.width,
            height: image.height,
            params,
        });

        if let Some(message) = &self.failure {
            return Err(EncodeError::EncodingFailed(message.clone()));
        }

        let mut rules = self.corrupt.lock().unwrap();
        let hit = rules.iter_mut().find(|rule| {
            rule.remaining > 0
                && rule.effort == params.effort
                && rule.quality.map_or(true, |q| q == params.quality)
        });
        if let Some(rule) = hit {
            rule.remaining -= 1;
            return Err(EncodeError::Corrupt {
                effort: params.effort,
            });
        }
        drop(rules);

        Ok(vec![params.quality; (self.size)(image, params)])
    }

    fn resample(&self, image: &DecodedImage, width: u32, height: u32) -> Result<DecodedImage, DecodeError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Resample {
                from: (image.width, image.height),
                width,
                height,
            });
        decode::resize(image, width, height, FilterType::Nearest)
    }
}

pub(crate) fn linear_size(image: &DecodedImage, params: EncodeParameters) -> usize {
    let pixels = image.pixel_count() as usize;
    if params.lossless {
        return pixels * 16;
    }
    pixels * (usize::from(params.quality) + 20) * (100 - usize::from(params.effort)) / 2000
}

pub(crate) fn gray_image(width: u32, height: u32) -> DecodedImage {
    DecodedImage::new(width, height, vec![128u8; (width * height * 3) as usize])
}
