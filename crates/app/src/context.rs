//! Process-wide state shared by the tracker timer, the render timer and the
//! command handler

use crate::command::{Command, CommandQueue};
use crate::config::{ConfigError, ConfigStore};
use crate::render::{Player, RenderOutcome};
use crate::settings::{self, Dialogs};
use crate::tracker::Tracker;
use crate::APP_NAME;
use overlay::{OverlayController, OverlaySurface, WindowSystem};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// State the tray thread reads for its menu and tooltip
#[derive(Debug, Clone)]
pub struct Status {
    pub enabled: bool,
    pub target: Option<String>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            enabled: true,
            target: None,
        }
    }
}

pub type SharedStatus = Arc<Mutex<Status>>;

pub struct AppContext<W, S, D>
where
    W: WindowSystem,
    S: OverlaySurface,
    D: Dialogs,
{
    store: ConfigStore,
    tracker: Tracker,
    player: Player,
    overlay: OverlayController<S>,
    windows: W,
    dialogs: D,
    commands: CommandQueue,
    status: SharedStatus,
    running: bool,
}

impl<W, S, D> AppContext<W, S, D>
where
    W: WindowSystem,
    S: OverlaySurface,
    D: Dialogs,
{
    pub fn new(
        store: ConfigStore,
        windows: W,
        overlay: OverlayController<S>,
        dialogs: D,
        commands: CommandQueue,
        status: SharedStatus,
    ) -> Self {
        let tracker = Tracker::new(ignore_patterns(&store));
        Self {
            store,
            tracker,
            player: Player::new(),
            overlay,
            windows,
            dialogs,
            commands,
            status,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.store.config().poll_interval_ms.max(1))
    }

    /// One tracker step. Returns whether the overlay or its media changed.
    pub fn tracker_tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let enabled = self.status.lock().enabled;
        let outcome = self.tracker.tick(
            self.store.rules(),
            enabled,
            &self.windows,
            &mut self.overlay,
        );

        if outcome.changed() {
            self.status.lock().target = self.tracker.state().active_target.clone();
        }
        outcome.changed()
    }

    /// Run queued commands, then draw one frame. Returns the delay until the
    /// next render tick.
    pub fn render_tick(&mut self) -> Duration {
        for command in self.commands.drain() {
            if !self.running {
                tracing::debug!(?command, "dropping command after exit");
                continue;
            }
            self.handle(command);
        }

        if !self.running {
            return self.player.period();
        }

        let outcome = self
            .player
            .tick(self.tracker.active_media(), &mut self.overlay);
        if let RenderOutcome::OpenFailed(path) = outcome {
            self.tracker.media_open_failed(&path);
        }

        self.player.period()
    }

    pub fn handle(&mut self, command: Command) {
        tracing::debug!(?command, "handling command");

        match command {
            Command::ShowCredits => settings::show_credits(&mut self.dialogs),
            Command::ListRules => settings::list_rules(&self.store, &mut self.dialogs),
            Command::OpenSettings => {
                let result = settings::add_rule(&mut self.store, &self.windows, &mut self.dialogs);
                self.after_edit(result);
            }
            Command::Delete => {
                let result = settings::delete_rule(&mut self.store, &mut self.dialogs);
                self.after_edit(result);
            }
            Command::Reload => {
                let result = self.store.reload().map(|_| true);
                self.after_edit(result);
            }
            Command::ToggleEnabled => self.toggle_enabled(),
            Command::Exit => self.shutdown(),
        }
    }

    fn after_edit(&mut self, result: Result<bool, ConfigError>) {
        match result {
            Ok(true) => {
                self.tracker.set_ignore(ignore_patterns(&self.store));
                // Re-evaluate media and opacity on the next tick
                self.tracker.reset();
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "settings change failed");
                self.dialogs.warn(&describe(&e));
            }
        }
    }

    fn toggle_enabled(&mut self) {
        let enabled = {
            let mut status = self.status.lock();
            status.enabled = !status.enabled;
            if !status.enabled {
                status.target = None;
            }
            status.enabled
        };

        if !enabled {
            self.overlay.hide();
            self.tracker.reset();
            self.player.release();
        }
        tracing::info!(enabled, "tracking toggled");
    }

    /// Release media and close the overlay. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }

        self.player.release();
        self.overlay.close();
        self.running = false;
        tracing::info!("shutting down");
    }
}

/// Built-in ignore pattern plus the configured ones
fn ignore_patterns(store: &ConfigStore) -> Vec<String> {
    std::iter::once(APP_NAME.to_string())
        .chain(store.config().ignore.iter().cloned())
        .collect()
}

fn describe(error: &ConfigError) -> String {
    match error {
        ConfigError::InvalidRule(reason) => format!("Invalid setting: {reason}."),
        ConfigError::Parse { path, .. } => format!(
            "{} could not be read. The previous settings stay active.",
            path.display()
        ),
        other => format!("The settings could not be saved: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{self, CommandSender};
    use crate::config::{TargetRule, CONFIG_FILE_NAME};
    use crate::testing::{FakeDesktop, Probe, Scripted};
    use overlay::Rect;
    use std::path::Path;

    struct Harness {
        _dir: tempfile::TempDir,
        desktop: FakeDesktop,
        probe: Probe,
        sender: CommandSender,
        status: SharedStatus,
        ctx: AppContext<FakeDesktop, Probe, Scripted>,
    }

    fn harness(dialogs: Scripted) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        store
            .commit(|c| {
                c.upsert(TargetRule::new("Discord", "missing-wall.png", 0.2, vec![]).unwrap())
            })
            .unwrap();

        let desktop = FakeDesktop::default();
        let probe = Probe::default();
        let (sender, queue) = command::channel();
        let status = SharedStatus::default();
        let ctx = AppContext::new(
            store,
            desktop.clone(),
            OverlayController::new(probe.clone()),
            dialogs,
            queue,
            status.clone(),
        );

        Harness {
            _dir: dir,
            desktop,
            probe,
            sender,
            status,
            ctx,
        }
    }

    const WIN: Rect = Rect {
        x: 0,
        y: 0,
        width: 640,
        height: 480,
    };

    #[test]
    fn tracker_tick_publishes_target() {
        let mut h = harness(Scripted::default());
        h.desktop.focus(1, "Discord", WIN);

        assert!(h.ctx.tracker_tick());
        assert_eq!(h.status.lock().target.as_deref(), Some("Discord"));
        assert!(!h.ctx.tracker_tick());
    }

    #[test]
    fn unreadable_media_clears_active_path() {
        let mut h = harness(Scripted::default());
        h.desktop.focus(1, "Discord", WIN);
        h.ctx.tracker_tick();
        assert_eq!(h.ctx.tracker.active_media(), Some(Path::new("missing-wall.png")));

        h.ctx.render_tick();
        assert_eq!(h.ctx.tracker.active_media(), None);

        // Not retried while the same target stays focused
        assert!(!h.ctx.tracker_tick());
        assert!(h.ctx.overlay.is_visible());
    }

    #[test]
    fn broken_media_on_next_target_blanks_overlay() {
        let mut h = harness(Scripted::default());
        let wall = h._dir.path().join("wall.png");
        image::RgbaImage::new(8, 8).save(&wall).unwrap();
        h.ctx
            .store
            .commit(|c| {
                c.upsert(TargetRule::new("Discord", wall.clone(), 0.2, vec![]).unwrap());
                c.upsert(TargetRule::new("Slack", "missing-slack.png", 0.4, vec![]).unwrap());
            })
            .unwrap();

        h.desktop.focus(1, "Discord", WIN);
        h.ctx.tracker_tick();
        h.ctx.render_tick();
        assert_eq!(h.probe.take().last().map(String::as_str), Some("present 640x480"));

        h.desktop.focus(2, "Slack", WIN);
        h.ctx.tracker_tick();
        h.ctx.render_tick();
        assert_eq!(h.probe.take(), vec!["opacity 0.4", "clear"]);
        assert_eq!(h.ctx.tracker.active_media(), None);
        assert!(h.ctx.overlay.is_visible());

        h.ctx.tracker_tick();
        h.ctx.render_tick();
        assert!(h.probe.take().is_empty());
    }

    #[test]
    fn commands_run_once_per_render_tick() {
        let mut h = harness(Scripted::default());
        h.sender.enqueue(Command::ListRules);
        h.sender.enqueue(Command::ShowCredits);

        h.ctx.render_tick();
        h.ctx.render_tick();

        let infos = &h.ctx.dialogs.infos;
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0], "Discord");
    }

    #[test]
    fn disabling_hides_and_suppresses_tracking() {
        let mut h = harness(Scripted::default());
        h.desktop.focus(1, "Discord", WIN);
        h.ctx.tracker_tick();
        assert!(h.ctx.overlay.is_visible());
        h.probe.take();

        h.sender.enqueue(Command::ToggleEnabled);
        h.ctx.render_tick();
        assert!(!h.status.lock().enabled);
        assert!(!h.ctx.overlay.is_visible());
        assert_eq!(h.ctx.tracker.active_media(), None);

        assert!(!h.ctx.tracker_tick());
        assert_eq!(h.probe.take(), vec!["hide"]);

        h.ctx.handle(Command::ToggleEnabled);
        assert!(h.ctx.tracker_tick());
        assert!(h.ctx.overlay.is_visible());
    }

    #[test]
    fn invalid_input_is_reported() {
        let dialogs = Scripted::new(&[Some("Discord"), Some("2"), Some("")], Some("w.png"));
        let mut h = harness(dialogs);
        h.ctx.handle(Command::OpenSettings);

        assert_eq!(h.ctx.dialogs.warnings.len(), 1);
        assert!(h.ctx.dialogs.warnings[0].starts_with("Invalid setting"));
        assert_eq!(h.ctx.store.config().rule("Discord").unwrap().opacity, 0.2);
    }

    #[test]
    fn corrupt_reload_keeps_rules() {
        let mut h = harness(Scripted::default());
        std::fs::write(h.ctx.store.path(), "{").unwrap();

        h.ctx.handle(Command::Reload);
        assert_eq!(h.ctx.store.rules().len(), 1);
        assert_eq!(h.ctx.dialogs.warnings.len(), 1);
    }

    #[test]
    fn exit_closes_overlay_once() {
        let mut h = harness(Scripted::default());
        h.sender.enqueue(Command::Exit);
        h.sender.enqueue(Command::ListRules);
        h.ctx.render_tick();

        assert!(!h.ctx.is_running());
        assert!(h.ctx.overlay.is_closed());
        assert!(h.ctx.dialogs.infos.is_empty());
        assert_eq!(h.probe.take(), vec!["close"]);

        h.ctx.shutdown();
        assert!(!h.ctx.tracker_tick());
        assert!(h.probe.take().is_empty());
    }
}
