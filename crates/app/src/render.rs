//! Frame pump: keeps one media handle open for the active path and pushes its
//! frames into the overlay

use media::{normalize_frame_rate, MediaHandle, MediaKind, MediaResult};
use overlay::{OverlayController, OverlaySurface};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Poll period when nothing animates
pub const IDLE_PERIOD: Duration = Duration::from_millis(100);

/// Timer period for a source playing at `rate` frames per second
pub fn frame_period(rate: f64) -> Duration {
    let ms = (1000.0 / normalize_frame_rate(rate)).round().max(1.0);
    Duration::from_millis(ms as u64)
}

pub type Opener = Box<dyn Fn(&Path) -> MediaResult<MediaHandle>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No active media or the overlay is hidden
    Idle,
    /// A frame was drawn
    Rendered,
    /// Still image already on screen at this size
    Unchanged,
    /// The decoder had nothing this tick
    Skipped,
    OpenFailed(PathBuf),
}

pub struct Player {
    live: Option<MediaHandle>,
    // Size the current still image was last drawn at
    still_drawn: Option<(u32, u32)>,
    opener: Opener,
}

impl Player {
    pub fn new() -> Self {
        Self::with_opener(Box::new(|path: &Path| MediaHandle::open(path)))
    }

    pub fn with_opener(opener: Opener) -> Self {
        Self {
            live: None,
            still_drawn: None,
            opener,
        }
    }

    /// Path of the live handle
    pub fn live_path(&self) -> Option<&Path> {
        self.live.as_ref().map(|h| h.path())
    }

    /// Period until the next tick
    pub fn period(&self) -> Duration {
        match &self.live {
            Some(handle) if handle.kind() != MediaKind::Still => frame_period(handle.frame_rate()),
            _ => IDLE_PERIOD,
        }
    }

    /// Release the live handle, if any
    pub fn release(&mut self) {
        if let Some(mut handle) = self.live.take() {
            handle.release();
        }
        self.still_drawn = None;
    }

    /// Render one frame of `active` into `overlay`.
    ///
    /// The previous handle is released and the overlay blanked before a new
    /// one is opened, so at most one decoder is alive at a time and a source
    /// that fails to open leaves nothing stale on screen.
    pub fn tick<S: OverlaySurface>(
        &mut self,
        active: Option<&Path>,
        overlay: &mut OverlayController<S>,
    ) -> RenderOutcome {
        let Some(path) = active else {
            self.release();
            overlay.clear();
            return RenderOutcome::Idle;
        };

        if self.live_path().is_some_and(|live| live != path) {
            self.release();
            overlay.clear();
        }

        if !overlay.is_visible() {
            return RenderOutcome::Idle;
        }

        if self.live.is_none() {
            match (self.opener)(path) {
                Ok(handle) => self.live = Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "wallpaper unavailable");
                    return RenderOutcome::OpenFailed(path.to_path_buf());
                }
            }
        }

        let Some(handle) = self.live.as_mut() else {
            return RenderOutcome::Idle;
        };

        let rect = overlay.rect();
        let size = (rect.width, rect.height);
        if handle.kind() == MediaKind::Still && self.still_drawn == Some(size) {
            return RenderOutcome::Unchanged;
        }

        match handle.next_frame(rect.width, rect.height) {
            Some(frame) => {
                overlay.blit(Some(frame));
                if handle.kind() == MediaKind::Still {
                    self.still_drawn = Some(size);
                }
                RenderOutcome::Rendered
            }
            None => RenderOutcome::Skipped,
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use media::{Frame, MediaError, StreamDecoder};
    use overlay::{OverlayResult, Rect, WindowId};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        opened: Cell<u32>,
        released: Cell<u32>,
        cleared: Cell<u32>,
        presented: RefCell<Vec<(u32, u32)>>,
    }

    struct FakeDecoder {
        counters: Rc<Counters>,
        fps: f64,
        released: bool,
    }

    impl StreamDecoder for FakeDecoder {
        fn size(&self) -> (u32, u32) {
            (4, 4)
        }

        fn frame_rate(&self) -> f64 {
            self.fps
        }

        fn read_frame(&mut self) -> MediaResult<Option<RgbaImage>> {
            Ok(Some(RgbaImage::new(4, 4)))
        }

        fn rewind(&mut self) -> MediaResult<()> {
            Ok(())
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.counters.released.set(self.counters.released.get() + 1);
            }
        }
    }

    struct Screen(Rc<Counters>);

    impl OverlaySurface for Screen {
        fn id(&self) -> WindowId {
            1
        }

        fn title(&self) -> &str {
            "overlay"
        }

        fn set_shown(&mut self, _shown: bool) -> OverlayResult<()> {
            Ok(())
        }

        fn set_opacity(&mut self, _opacity: f32) -> OverlayResult<()> {
            Ok(())
        }

        fn set_bounds(&mut self, _rect: Rect) -> OverlayResult<()> {
            Ok(())
        }

        fn present(&mut self, frame: Frame) -> OverlayResult<()> {
            self.0.presented.borrow_mut().push((frame.width, frame.height));
            Ok(())
        }

        fn clear(&mut self) -> OverlayResult<()> {
            self.0.cleared.set(self.0.cleared.get() + 1);
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn fixture(fps: f64) -> (Player, Rc<Counters>, OverlayController<Screen>) {
        let counters = Rc::new(Counters::default());
        let shared = counters.clone();
        let player = Player::with_opener(Box::new(move |path: &Path| {
            if path.to_string_lossy().contains("missing") {
                return Err(MediaError::UnreadableMedia {
                    path: path.to_path_buf(),
                    reason: "not found".into(),
                });
            }
            shared.opened.set(shared.opened.get() + 1);
            Ok(MediaHandle::with_decoder(
                path,
                Box::new(FakeDecoder {
                    counters: shared.clone(),
                    fps,
                    released: false,
                }),
            ))
        }));

        let mut overlay = OverlayController::new(Screen(counters.clone()));
        overlay.move_resize(Rect::new(0, 0, 32, 16));
        overlay.show(0.2);
        (player, counters, overlay)
    }

    #[test]
    fn period_follows_frame_rate() {
        assert_eq!(frame_period(30.0), Duration::from_millis(33));
        assert_eq!(frame_period(25.0), Duration::from_millis(40));
        assert_eq!(frame_period(1.0), Duration::from_millis(1000));
        assert_eq!(frame_period(5000.0), Duration::from_millis(1));
        assert_eq!(frame_period(0.0), Duration::from_millis(1000));
        assert_eq!(frame_period(f64::NAN), Duration::from_millis(1000));
    }

    #[test]
    fn renders_at_overlay_size() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        let outcome = player.tick(Some(Path::new("a.mp4")), &mut overlay);
        assert_eq!(outcome, RenderOutcome::Rendered);
        assert_eq!(*counters.presented.borrow(), vec![(32, 16)]);
        assert_eq!(player.period(), Duration::from_millis(33));
    }

    #[test]
    fn swap_releases_previous_handle_first() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        player.tick(Some(Path::new("a.mp4")), &mut overlay);
        player.tick(Some(Path::new("a.mp4")), &mut overlay);
        assert_eq!(counters.opened.get(), 1);

        player.tick(Some(Path::new("b.mp4")), &mut overlay);
        assert_eq!(counters.opened.get(), 2);
        assert_eq!(counters.released.get(), 1);
        assert_eq!(player.live_path(), Some(Path::new("b.mp4")));
    }

    #[test]
    fn no_active_media_releases_handle() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        player.tick(Some(Path::new("a.mp4")), &mut overlay);
        assert_eq!(player.tick(None, &mut overlay), RenderOutcome::Idle);
        assert_eq!(counters.released.get(), 1);
        assert_eq!(counters.cleared.get(), 1);
        assert_eq!(player.live_path(), None);
        assert_eq!(player.period(), IDLE_PERIOD);
    }

    #[test]
    fn open_failure_is_reported() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        player.tick(Some(Path::new("a.mp4")), &mut overlay);

        let outcome = player.tick(Some(Path::new("missing.mp4")), &mut overlay);
        assert_eq!(outcome, RenderOutcome::OpenFailed(PathBuf::from("missing.mp4")));
        assert_eq!(counters.released.get(), 1);
        assert_eq!(counters.cleared.get(), 1);
        assert_eq!(player.live_path(), None);
    }

    #[test]
    fn hidden_overlay_draws_nothing() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        overlay.hide();
        assert_eq!(player.tick(Some(Path::new("a.mp4")), &mut overlay), RenderOutcome::Idle);
        assert!(counters.presented.borrow().is_empty());
        assert_eq!(counters.opened.get(), 0);
    }

    #[test]
    fn hidden_overlay_still_drops_stale_handle() {
        let (mut player, counters, mut overlay) = fixture(30.0);
        player.tick(Some(Path::new("a.mp4")), &mut overlay);
        overlay.hide();

        assert_eq!(player.tick(Some(Path::new("b.mp4")), &mut overlay), RenderOutcome::Idle);
        assert_eq!(counters.released.get(), 1);
        assert_eq!(counters.opened.get(), 1);
        assert_eq!(player.live_path(), None);
    }

    #[test]
    fn still_image_is_drawn_once_per_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        RgbaImage::new(8, 8).save(&path).unwrap();

        let counters = Rc::new(Counters::default());
        let mut overlay = OverlayController::new(Screen(counters.clone()));
        overlay.move_resize(Rect::new(0, 0, 20, 10));
        overlay.show(0.5);

        let mut player = Player::new();
        assert_eq!(player.tick(Some(&path), &mut overlay), RenderOutcome::Rendered);
        assert_eq!(player.tick(Some(&path), &mut overlay), RenderOutcome::Unchanged);
        assert_eq!(player.period(), IDLE_PERIOD);

        overlay.move_resize(Rect::new(0, 0, 40, 20));
        assert_eq!(player.tick(Some(&path), &mut overlay), RenderOutcome::Rendered);
        assert_eq!(*counters.presented.borrow(), vec![(20, 10), (40, 20)]);
    }
}
