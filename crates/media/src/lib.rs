//! Media module for FreedomWall
//!
//! Opens wallpaper files (still images, animated GIFs, videos) and hands out
//! frames scaled to the overlay size.

mod animation;
pub mod frame;
mod handle;
pub mod video;

pub use frame::Frame;
pub use handle::MediaHandle;
pub use video::{FfmpegDecoder, StreamDecoder};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Cannot open {}: {reason}", path.display())]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    pub(crate) fn unreadable(path: &Path, reason: impl ToString) -> Self {
        MediaError::UnreadableMedia {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Extensions decoded as a video stream
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm", "wmv"];

/// Extensions decoded as a looping animation
pub const ANIMATION_EXTENSIONS: &[&str] = &["gif"];

/// How a media file is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Single picture, resized on every request
    Still,
    /// Animated image decoded fully into memory
    Animation,
    /// Streaming video decoded frame by frame
    Video,
}

impl MediaKind {
    /// Classify a path by its (case-insensitive) extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if ANIMATION_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Animation
        } else {
            MediaKind::Still
        }
    }
}

/// Clamp a reported frame rate to something usable as a timer period.
///
/// Sources that report zero, a negative value or NaN play at 1 fps.
pub fn normalize_frame_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        1.0
    }
}
