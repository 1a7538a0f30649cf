//! Single-owner front end for the overlay surface

use crate::{clamp_opacity, OverlaySurface, Rect};
use media::Frame;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

/// Owns the overlay surface and tracks its visible state.
///
/// The window toolkit only allows mutation from the thread that created the
/// window, so the controller is `!Send` and every mutating call checks that it
/// runs on the creating thread.
pub struct OverlayController<S: OverlaySurface> {
    surface: S,
    owner: ThreadId,
    visible: bool,
    opacity: f32,
    rect: Rect,
    // A frame is on screen
    drawn: bool,
    closed: bool,
    _not_send: PhantomData<*const ()>,
}

impl<S: OverlaySurface> OverlayController<S> {
    /// Take ownership of a hidden surface on the current thread
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            owner: thread::current().id(),
            visible: false,
            opacity: 0.0,
            rect: Rect::default(),
            drawn: false,
            closed: false,
            _not_send: PhantomData,
        }
    }

    fn assert_owner(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "overlay mutated outside the UI thread"
        );
    }

    /// Show the overlay on top at `opacity`.
    ///
    /// On an already visible overlay only a changed opacity is applied.
    pub fn show(&mut self, opacity: f32) {
        self.assert_owner();
        if self.closed {
            return;
        }

        let opacity = clamp_opacity(opacity);
        if !self.visible || opacity != self.opacity {
            if let Err(e) = self.surface.set_opacity(opacity) {
                tracing::warn!(error = %e, opacity, "set overlay opacity failed");
            }
            self.opacity = opacity;
        }

        if !self.visible {
            if let Err(e) = self.surface.set_shown(true) {
                tracing::warn!(error = %e, "show overlay failed");
                return;
            }
            self.visible = true;
            tracing::debug!(opacity, "overlay shown");
        }
    }

    /// Hide the overlay and drop it from the topmost band
    pub fn hide(&mut self) {
        self.assert_owner();
        if self.closed || !self.visible {
            return;
        }

        if let Err(e) = self.surface.set_shown(false) {
            tracing::warn!(error = %e, "hide overlay failed");
        }
        self.visible = false;
        tracing::debug!("overlay hidden");
    }

    /// Move and resize in one step
    pub fn move_resize(&mut self, rect: Rect) {
        self.assert_owner();
        if self.closed {
            return;
        }

        if let Err(e) = self.surface.set_bounds(rect) {
            tracing::warn!(error = %e, ?rect, "move overlay failed");
            return;
        }
        self.rect = rect;
    }

    /// Draw a frame; `None` keeps the last frame on screen
    pub fn blit(&mut self, frame: Option<Frame>) {
        self.assert_owner();
        if self.closed {
            return;
        }

        if let Some(frame) = frame {
            match self.surface.present(frame) {
                Ok(()) => self.drawn = true,
                Err(e) => tracing::debug!(error = %e, "present frame failed"),
            }
        }
    }

    /// Blank the overlay so only the target shows through
    pub fn clear(&mut self) {
        self.assert_owner();
        if self.closed || !self.drawn {
            return;
        }

        if let Err(e) = self.surface.clear() {
            tracing::debug!(error = %e, "clear overlay failed");
        }
        // The retained frame is dropped even when the repaint failed
        self.drawn = false;
    }

    /// Destroy the surface; later calls are no-ops
    pub fn close(&mut self) {
        self.assert_owner();
        if self.closed {
            return;
        }

        self.surface.close();
        self.closed = true;
        self.visible = false;
        tracing::info!("overlay closed");
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Bounds from the last successful `move_resize`
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn title(&self) -> &str {
        self.surface.title()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OverlayError, OverlayResult, WindowId};
    use std::panic::AssertUnwindSafe;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_bounds: bool,
    }

    impl OverlaySurface for Recorder {
        fn id(&self) -> WindowId {
            7
        }

        fn title(&self) -> &str {
            "overlay"
        }

        fn set_shown(&mut self, shown: bool) -> OverlayResult<()> {
            self.calls.push(format!("shown:{shown}"));
            Ok(())
        }

        fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()> {
            self.calls.push(format!("opacity:{opacity}"));
            Ok(())
        }

        fn set_bounds(&mut self, rect: Rect) -> OverlayResult<()> {
            if self.fail_bounds {
                return Err(OverlayError::WindowQuery("gone".into()));
            }
            self.calls.push(format!("bounds:{}x{}", rect.width, rect.height));
            Ok(())
        }

        fn present(&mut self, frame: Frame) -> OverlayResult<()> {
            self.calls.push(format!("present:{}x{}", frame.width, frame.height));
            Ok(())
        }

        fn clear(&mut self) -> OverlayResult<()> {
            self.calls.push("clear".into());
            Ok(())
        }

        fn close(&mut self) {
            self.calls.push("close".into());
        }
    }

    #[test]
    fn show_and_hide_are_idempotent() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.show(0.2);
        overlay.show(0.2);
        overlay.hide();
        overlay.hide();

        assert_eq!(
            overlay.surface().calls,
            vec!["opacity:0.2", "shown:true", "shown:false"]
        );
        assert!(!overlay.is_visible());
    }

    #[test]
    fn show_while_visible_only_updates_changed_opacity() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.show(0.2);
        overlay.show(0.5);
        assert_eq!(
            overlay.surface().calls,
            vec!["opacity:0.2", "shown:true", "opacity:0.5"]
        );
        assert_eq!(overlay.opacity(), 0.5);
    }

    #[test]
    fn opacity_below_minimum_is_clamped() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.show(0.0);
        assert_eq!(overlay.opacity(), crate::MIN_OPACITY);
    }

    #[test]
    fn blit_none_is_a_no_op() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.blit(None);
        overlay.blit(Some(Frame {
            data: vec![0; 16],
            width: 2,
            height: 2,
        }));
        assert_eq!(overlay.surface().calls, vec!["present:2x2"]);
    }

    #[test]
    fn clear_only_touches_a_drawn_surface() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.clear();
        overlay.blit(Some(Frame {
            data: vec![0; 4],
            width: 1,
            height: 1,
        }));
        overlay.clear();
        overlay.clear();
        assert_eq!(overlay.surface().calls, vec!["present:1x1", "clear"]);
    }

    #[test]
    fn failed_move_keeps_previous_rect() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.move_resize(Rect::new(0, 0, 10, 10));
        overlay.surface.fail_bounds = true;
        overlay.move_resize(Rect::new(5, 5, 20, 20));
        assert_eq!(overlay.rect(), Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn closed_overlay_ignores_everything() {
        let mut overlay = OverlayController::new(Recorder::default());
        overlay.close();
        overlay.show(0.5);
        overlay.move_resize(Rect::new(0, 0, 1, 1));
        overlay.close();
        assert_eq!(overlay.surface().calls, vec!["close"]);
        assert!(overlay.is_closed());
    }

    #[test]
    fn mutation_from_another_thread_panics() {
        let mut overlay = OverlayController::new(Recorder::default());
        assert_eq!(overlay.owner, thread::current().id());

        // The controller is !Send, so pretend another thread created it.
        overlay.owner = thread::spawn(|| thread::current().id()).join().unwrap();

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| overlay.hide()));
        assert!(result.is_err());
    }
}
