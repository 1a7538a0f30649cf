//! Overlay module for FreedomWall
//!
//! Window-system queries and the translucent, click-through overlay window
//! that is drawn over the tracked application.

pub mod controller;
#[cfg(windows)]
pub mod system;
#[cfg(windows)]
pub mod window;

pub use controller::OverlayController;
#[cfg(windows)]
pub use system::Win32Windows;
#[cfg(windows)]
pub use window::OverlayWindow;

use media::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Window query failed: {0}")]
    WindowQuery(String),

    #[error("Overlay window closed")]
    Closed,
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Lowest opacity the overlay accepts; anything fainter is invisible
pub const MIN_OPACITY: f32 = 0.05;

/// Clamp an opacity into `[MIN_OPACITY, 1.0]`. NaN maps to the minimum.
pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        MIN_OPACITY
    } else {
        opacity.clamp(MIN_OPACITY, 1.0)
    }
}

/// Native window handle as a plain integer; 0 means "no window"
pub type WindowId = isize;

/// Rectangle in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from left/top/right/bottom edges; inverted edges give an empty rect
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The window that currently has keyboard focus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForegroundWindow {
    pub id: WindowId,
    pub title: String,
}

/// Title comparison used when searching for windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMatch {
    Exact,
    Contains,
}

impl TitleMatch {
    pub fn matches(self, title: &str, needle: &str) -> bool {
        match self {
            TitleMatch::Exact => title == needle,
            TitleMatch::Contains => title.contains(needle),
        }
    }
}

/// OS window queries.
///
/// Everything except [`WindowSystem::set_click_through`] is read-only.
pub trait WindowSystem {
    /// Focused window; `id == 0` when nothing has focus
    fn foreground_window(&self) -> OverlayResult<ForegroundWindow>;

    /// Outer bounds of `id` in screen coordinates
    fn window_rect(&self, id: WindowId) -> OverlayResult<Rect>;

    /// All top-level windows with their titles, in enumeration order
    fn window_titles(&self) -> OverlayResult<Vec<(WindowId, String)>>;

    /// First top-level window whose title matches `needle`
    fn find_window_by_title(
        &self,
        needle: &str,
        mode: TitleMatch,
    ) -> OverlayResult<Option<WindowId>> {
        Ok(self
            .window_titles()?
            .into_iter()
            .find(|(_, title)| mode.matches(title, needle))
            .map(|(id, _)| id))
    }

    /// Let mouse input fall through `id` to the windows beneath
    fn set_click_through(&self, id: WindowId) -> OverlayResult<()>;
}

/// Raw operations on the overlay window.
///
/// Only [`OverlayController`] calls these; it owns the bookkeeping.
pub trait OverlaySurface {
    /// Native handle, for click-through styling
    fn id(&self) -> WindowId;

    /// Caption of the overlay window
    fn title(&self) -> &str;

    /// Show (and make topmost) or hide (and drop topmost)
    fn set_shown(&mut self, shown: bool) -> OverlayResult<()>;

    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()>;

    /// Move and resize in one call
    fn set_bounds(&mut self, rect: Rect) -> OverlayResult<()>;

    /// Draw `frame` at the top-left corner
    fn present(&mut self, frame: Frame) -> OverlayResult<()>;

    /// Drop the retained frame and paint the window fully transparent
    fn clear(&mut self) -> OverlayResult<()>;

    /// Destroy the window
    fn close(&mut self);
}
