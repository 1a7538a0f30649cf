//! Animated GIF playback

use crate::{normalize_frame_rate, MediaResult};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fallback delay for frames that declare none, as browsers do
const DEFAULT_DELAY_MS: f64 = 100.0;

pub(crate) struct Animation {
    frames: Vec<RgbaImage>,
    frame_rate: f64,
    cursor: usize,
}

impl Animation {
    pub(crate) fn open(path: &Path) -> MediaResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let decoder = GifDecoder::new(reader)?;
        let frames = decoder.into_frames().collect_frames()?;

        let mut total_ms = 0.0;
        let mut images = Vec::with_capacity(frames.len());
        for frame in frames {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = if denom == 0 || numer == 0 {
                DEFAULT_DELAY_MS
            } else {
                numer as f64 / denom as f64
            };
            total_ms += delay;
            images.push(frame.into_buffer());
        }

        if images.is_empty() {
            return Err(crate::MediaError::Decode("animation has no frames".into()));
        }

        let frame_rate = normalize_frame_rate(images.len() as f64 * 1000.0 / total_ms);
        Ok(Self {
            frames: images,
            frame_rate,
            cursor: 0,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    pub(crate) fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub(crate) fn position(&self) -> u64 {
        self.cursor as u64
    }

    /// Next frame, wrapping around after the last one
    pub(crate) fn next_frame(&mut self) -> &RgbaImage {
        let frame = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();
        frame
    }
}
