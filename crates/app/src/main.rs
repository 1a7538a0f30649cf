//! FreedomWall - translucent wallpaper over a chosen application's window

#![windows_subsystem = "windows"]
#![cfg_attr(not(windows), allow(dead_code))]

mod command;
mod config;
mod context;
#[cfg(windows)]
mod dialogs;
mod logging;
#[cfg(windows)]
mod prompt;
mod render;
mod settings;
#[cfg(test)]
mod testing;
mod tracker;
#[cfg(windows)]
mod tray;
#[cfg(windows)]
mod ui;

/// Title of every dialog; focus on these never moves the overlay
pub const APP_NAME: &str = "FreedomWall";

pub const OVERLAY_TITLE: &str = "FreedomWall Overlay";

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use crate::config::ConfigStore;
    use crate::context::{AppContext, SharedStatus};
    use crate::dialogs::NativeDialogs;
    use crate::settings::Dialogs;
    use crate::tray::TrayHandle;
    use anyhow::Context;
    use overlay::{OverlayController, OverlaySurface, OverlayWindow, Win32Windows, WindowSystem};
    use std::path::Path;
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    // Window rects must be physical pixels
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    let config_path = config::resolve_config_path()?;
    let log_dir = config_path.parent().unwrap_or(Path::new("."));
    let _log_guard = logging::init(log_dir, config::peek_debug(&config_path));

    let store = match ConfigStore::open(&config_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "cannot load config");
            NativeDialogs.warn(&format!("{e}\nFix or delete the file and start again."));
            return Err(e).context("load config");
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        rules = store.rules().len(),
        "starting"
    );

    let windows = Win32Windows;
    let overlay_window = OverlayWindow::create(OVERLAY_TITLE).context("create overlay window")?;
    if let Err(e) = windows.set_click_through(overlay_window.id()) {
        tracing::warn!(error = %e, "overlay is not click-through");
    }
    let overlay = OverlayController::new(overlay_window);

    let status = SharedStatus::default();
    let (sender, queue) = command::channel();
    let tray = TrayHandle::spawn(sender, status.clone())?;

    let ctx = AppContext::new(store, windows, overlay, NativeDialogs, queue, status);
    ui::run(ctx, tray)
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("{APP_NAME} only runs on Windows")
}
