//! Foreground window tracking
//!
//! Once per tick the tracker looks at the focused window, picks the first rule
//! whose key occurs in its title, and drives the overlay to sit on top of it.
//! Repeated ticks against an unchanged foreground window issue no overlay
//! calls.

use crate::config::TargetRule;
use overlay::{clamp_opacity, OverlayController, OverlaySurface, Rect, WindowSystem};
use std::path::{Path, PathBuf};

/// What the tracker currently believes about the target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedState {
    /// Key of the rule that matched last
    pub active_target: Option<String>,
    /// Media the render loop should be playing; `None` means nothing
    pub active_media: Option<PathBuf>,
    /// Overlay bounds applied for the active target
    pub last_rect: Option<Rect>,
    /// Media path that failed to open for the active target
    pub media_failed: Option<PathBuf>,
}

impl TrackedState {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Side effects of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub shown: bool,
    pub hidden: bool,
    pub moved: bool,
    pub media_changed: bool,
}

impl TickOutcome {
    pub fn changed(&self) -> bool {
        self.shown || self.hidden || self.moved || self.media_changed
    }
}

pub struct Tracker {
    state: TrackedState,
    ignore: Vec<String>,
}

impl Tracker {
    /// `ignore` lists title fragments during which tracking pauses
    pub fn new(ignore: Vec<String>) -> Self {
        Self {
            state: TrackedState::default(),
            ignore: ignore.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    pub fn set_ignore(&mut self, ignore: Vec<String>) {
        self.ignore = ignore.into_iter().filter(|p| !p.is_empty()).collect();
    }

    pub fn active_media(&self) -> Option<&Path> {
        self.state.active_media.as_deref()
    }

    /// Forget the active target so the next match starts fresh
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Called by the render loop when the active media cannot be opened
    pub fn media_open_failed(&mut self, path: &Path) {
        if self.state.active_media.as_deref() == Some(path) {
            self.state.active_media = None;
        }
        self.state.media_failed = Some(path.to_path_buf());
    }

    /// Run one tracking step
    pub fn tick<W, S>(
        &mut self,
        rules: &[TargetRule],
        enabled: bool,
        windows: &W,
        overlay: &mut OverlayController<S>,
    ) -> TickOutcome
    where
        W: WindowSystem + ?Sized,
        S: OverlaySurface,
    {
        let mut outcome = TickOutcome::default();
        if !enabled || rules.is_empty() {
            return outcome;
        }

        let foreground = match windows.foreground_window() {
            Ok(fg) if fg.id != 0 => fg,
            Ok(_) => return outcome,
            Err(e) => {
                tracing::debug!(error = %e, "foreground query failed");
                return outcome;
            }
        };

        // Focus moving onto the overlay itself must not hide it.
        if foreground.title == overlay.title() {
            return outcome;
        }
        if self.ignore.iter().any(|p| foreground.title.contains(p.as_str())) {
            return outcome;
        }

        match rules.iter().find(|rule| rule.matches(&foreground.title)) {
            Some(rule) => {
                let rect = match windows.window_rect(foreground.id) {
                    Ok(rect) => rect,
                    Err(e) => {
                        tracing::debug!(error = %e, target = %rule.key, "target rect query failed");
                        return outcome;
                    }
                };

                let target_changed = self.state.active_target.as_deref() != Some(rule.key.as_str());
                if target_changed {
                    tracing::info!(target = %rule.key, title = %foreground.title, "target activated");
                    self.state.active_target = Some(rule.key.clone());
                    self.state.media_failed = None;
                }

                let wanted = Some(rule.media_path.as_path());
                if self.state.active_media.as_deref() != wanted
                    && self.state.media_failed.as_deref() != wanted
                {
                    self.state.active_media = Some(rule.media_path.clone());
                    outcome.media_changed = true;
                }

                if self.state.last_rect != Some(rect) {
                    overlay.move_resize(rect);
                    if overlay.rect() == rect {
                        self.state.last_rect = Some(rect);
                        outcome.moved = true;
                    }
                }

                if !overlay.is_visible() {
                    overlay.show(rule.opacity);
                    outcome.shown = overlay.is_visible();
                } else if target_changed && overlay.opacity() != clamp_opacity(rule.opacity) {
                    overlay.show(rule.opacity);
                }
            }
            None => {
                if overlay.is_visible() {
                    overlay.hide();
                    outcome.hidden = true;
                    tracing::debug!(title = %foreground.title, "target lost focus");
                }
            }
        }

        if !overlay.is_visible() && self.state != TrackedState::default() {
            self.state.reset();
        }

        outcome
    }
}
