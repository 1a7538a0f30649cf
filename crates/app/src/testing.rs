//! Fakes shared by the unit tests

use crate::settings::Dialogs;
use crate::OVERLAY_TITLE;
use media::Frame;
use overlay::{
    ForegroundWindow, OverlayError, OverlayResult, OverlaySurface, Rect, WindowId, WindowSystem,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Default)]
struct DesktopState {
    foreground: RefCell<Option<ForegroundWindow>>,
    rects: RefCell<HashMap<WindowId, Rect>>,
    titles: RefCell<Vec<(WindowId, String)>>,
    fail_foreground: Cell<bool>,
}

/// Scriptable desktop. Clones share state.
#[derive(Clone, Default)]
pub struct FakeDesktop(Rc<DesktopState>);

impl FakeDesktop {
    /// Open a window without focusing it
    pub fn open(&self, id: WindowId, title: &str) {
        let mut titles = self.0.titles.borrow_mut();
        titles.retain(|(existing, _)| *existing != id);
        titles.push((id, title.to_string()));
    }

    /// Open and focus a window with the given bounds
    pub fn focus(&self, id: WindowId, title: &str, rect: Rect) {
        self.open(id, title);
        self.0.rects.borrow_mut().insert(id, rect);
        self.focus_unsized(id, title);
    }

    /// Focus a window whose bounds cannot be queried
    pub fn focus_unsized(&self, id: WindowId, title: &str) {
        *self.0.foreground.borrow_mut() = Some(ForegroundWindow {
            id,
            title: title.to_string(),
        });
    }

    pub fn fail_foreground(&self, fail: bool) {
        self.0.fail_foreground.set(fail);
    }
}

impl WindowSystem for FakeDesktop {
    fn foreground_window(&self) -> OverlayResult<ForegroundWindow> {
        if self.0.fail_foreground.get() {
            return Err(OverlayError::WindowQuery("busy".into()));
        }
        Ok(self.0.foreground.borrow().clone().unwrap_or_default())
    }

    fn window_rect(&self, id: WindowId) -> OverlayResult<Rect> {
        self.0
            .rects
            .borrow()
            .get(&id)
            .copied()
            .ok_or_else(|| OverlayError::WindowQuery("no such window".into()))
    }

    fn window_titles(&self) -> OverlayResult<Vec<(WindowId, String)>> {
        Ok(self.0.titles.borrow().clone())
    }

    fn set_click_through(&self, _id: WindowId) -> OverlayResult<()> {
        Ok(())
    }
}

/// Overlay surface that records every call. Clones share the log.
#[derive(Clone, Default)]
pub struct Probe(Rc<RefCell<Vec<String>>>);

impl Probe {
    /// Calls recorded since the last `take`
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl OverlaySurface for Probe {
    fn id(&self) -> WindowId {
        99
    }

    fn title(&self) -> &str {
        OVERLAY_TITLE
    }

    fn set_shown(&mut self, shown: bool) -> OverlayResult<()> {
        self.0
            .borrow_mut()
            .push(if shown { "show" } else { "hide" }.into());
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()> {
        self.0.borrow_mut().push(format!("opacity {opacity}"));
        Ok(())
    }

    fn set_bounds(&mut self, rect: Rect) -> OverlayResult<()> {
        self.0.borrow_mut().push(format!(
            "move {},{} {}x{}",
            rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn present(&mut self, frame: Frame) -> OverlayResult<()> {
        self.0
            .borrow_mut()
            .push(format!("present {}x{}", frame.width, frame.height));
        Ok(())
    }

    fn clear(&mut self) -> OverlayResult<()> {
        self.0.borrow_mut().push("clear".into());
        Ok(())
    }

    fn close(&mut self) {
        self.0.borrow_mut().push("close".into());
    }
}

/// Dialogs that replay canned answers and record what was shown
#[derive(Default)]
pub struct Scripted {
    pub answers: VecDeque<Option<String>>,
    pub media: Option<PathBuf>,
    pub infos: Vec<String>,
    pub warnings: Vec<String>,
}

impl Scripted {
    pub fn new(answers: &[Option<&str>], media: Option<&str>) -> Self {
        Self {
            answers: answers.iter().map(|a| a.map(String::from)).collect(),
            media: media.map(PathBuf::from),
            ..Default::default()
        }
    }
}

impl Dialogs for Scripted {
    fn prompt(&mut self, _message: &str) -> Option<String> {
        self.answers.pop_front().flatten()
    }

    fn pick_media(&mut self) -> Option<PathBuf> {
        self.media.take()
    }

    fn info(&mut self, message: &str) {
        self.infos.push(message.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}
