//! Open media resources

use crate::animation::Animation;
use crate::video::{FfmpegDecoder, StreamDecoder, VideoStream};
use crate::{Frame, MediaError, MediaKind, MediaResult};
use image::RgbaImage;
use std::path::{Path, PathBuf};

enum Source {
    Still(RgbaImage),
    Animation(Animation),
    Video(VideoStream),
    Released,
}

/// One open wallpaper file and its decode state.
///
/// Video handles own a decoder process; call [`MediaHandle::release`] when
/// the handle is replaced. Dropping an unreleased handle releases it too.
pub struct MediaHandle {
    path: PathBuf,
    kind: MediaKind,
    source: Source,
}

impl MediaHandle {
    /// Open `path`, classifying it by extension.
    ///
    /// Every failure is reported as [`MediaError::UnreadableMedia`].
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let kind = MediaKind::from_path(path);

        let source = match kind {
            MediaKind::Still => image::open(path)
                .map(|img| Source::Still(img.to_rgba8()))
                .map_err(|e| MediaError::unreadable(path, e))?,
            MediaKind::Animation => Animation::open(path)
                .map(Source::Animation)
                .map_err(|e| MediaError::unreadable(path, e))?,
            MediaKind::Video => FfmpegDecoder::open(path)
                .map(|d| Source::Video(VideoStream::new(Box::new(d))))
                .map_err(|e| MediaError::unreadable(path, e))?,
        };

        tracing::info!(path = %path.display(), ?kind, "media opened");
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            source,
        })
    }

    /// Wrap an already constructed video decoder
    pub fn with_decoder(path: impl Into<PathBuf>, decoder: Box<dyn StreamDecoder>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Video,
            source: Source::Video(VideoStream::new(decoder)),
        }
    }

    /// Path this handle was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Frames per second; 1 for still images
    pub fn frame_rate(&self) -> f64 {
        match &self.source {
            Source::Still(_) | Source::Released => 1.0,
            Source::Animation(anim) => anim.frame_rate(),
            Source::Video(stream) => stream.frame_rate(),
        }
    }

    /// Native size of the source
    pub fn native_size(&self) -> (u32, u32) {
        match &self.source {
            Source::Still(img) => img.dimensions(),
            Source::Animation(anim) => anim.size(),
            Source::Video(stream) => stream.size(),
            Source::Released => (0, 0),
        }
    }

    /// Index of the frame the next call decodes (0 for still images)
    pub fn position(&self) -> u64 {
        match &self.source {
            Source::Animation(anim) => anim.position(),
            Source::Video(stream) => stream.position(),
            Source::Still(_) | Source::Released => 0,
        }
    }

    /// Next displayable frame scaled to `width`x`height`.
    ///
    /// Videos and animations loop forever. `None` means "skip this tick": a
    /// decode error, a zero-sized target, or a released handle.
    pub fn next_frame(&mut self, width: u32, height: u32) -> Option<Frame> {
        if width == 0 || height == 0 {
            return None;
        }

        match &mut self.source {
            Source::Still(img) => Frame::scaled(img, width, height),
            Source::Animation(anim) => Frame::scaled(anim.next_frame(), width, height),
            Source::Video(stream) => {
                let frame = stream.next_frame()?;
                Frame::scaled(&frame, width, height)
            }
            Source::Released => None,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self.source, Source::Released)
    }

    /// Free decoder resources. Safe to call more than once.
    pub fn release(&mut self) {
        if let Source::Video(stream) = &mut self.source {
            stream.release();
        }
        if !self.is_released() {
            tracing::debug!(path = %self.path.display(), "media released");
        }
        self.source = Source::Released;
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .finish()
    }
}
