//! Dialog-driven rule editing

use crate::config::{parse_exceptions, parse_opacity, ConfigResult, ConfigStore, TargetRule};
use crate::APP_NAME;
use overlay::{TitleMatch, WindowSystem};
use std::path::PathBuf;

/// Modal user interaction used by the settings flows
pub trait Dialogs {
    /// Ask for one line of text; `None` when cancelled
    fn prompt(&mut self, message: &str) -> Option<String>;

    /// Let the user choose a wallpaper file
    fn pick_media(&mut self) -> Option<PathBuf>;

    fn info(&mut self, message: &str);

    fn warn(&mut self, message: &str);
}

const TITLE_PROMPT: &str = "Enter text contained in the title of the window to decorate.";

const OPACITY_PROMPT: &str = "Enter the wallpaper opacity (0.05 - 1).\n\
    The default is 0.2. Around 0.3 suits white backgrounds, around 0.1 dark ones.";

const EXCEPTION_PROMPT: &str = "Enter title text of windows to exclude.\n\
    Separate several entries with commas ( , ).\n\n\
    A browser tab mentioning the decorated app would otherwise match too.";

const DELETE_PROMPT: &str = "Enter the name of the setting to delete.";

/// Add or replace a rule. Returns whether the config changed.
///
/// Cancelling any step aborts without touching the config. Invalid opacity
/// surfaces as `ConfigError::InvalidRule`.
pub fn add_rule<W, D>(store: &mut ConfigStore, windows: &W, dialogs: &mut D) -> ConfigResult<bool>
where
    W: WindowSystem + ?Sized,
    D: Dialogs + ?Sized,
{
    let Some(key) = dialogs.prompt(TITLE_PROMPT) else {
        return Ok(false);
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        return Ok(false);
    }

    let Some(opacity) = dialogs.prompt(OPACITY_PROMPT) else {
        return Ok(false);
    };
    let opacity = parse_opacity(&opacity)?;

    let exceptions = dialogs
        .prompt(EXCEPTION_PROMPT)
        .map(|text| parse_exceptions(&text))
        .unwrap_or_default();

    let Some(media_path) = dialogs.pick_media() else {
        return Ok(false);
    };

    match windows.find_window_by_title(&key, TitleMatch::Contains) {
        Ok(Some(_)) => {}
        Ok(None) => {
            dialogs.warn(&format!("No window with \"{key}\" in its title was found."));
            return Ok(false);
        }
        Err(e) => {
            tracing::warn!(error = %e, "window enumeration failed");
            dialogs.warn(&format!("No window with \"{key}\" in its title was found."));
            return Ok(false);
        }
    }

    let rule = TargetRule::new(key, media_path, opacity, exceptions)?;
    tracing::info!(rule = %rule.key, path = %rule.media_path.display(), opacity, "rule saved");
    store.commit(|config| config.upsert(rule))?;

    dialogs.info("Wallpaper set.");
    Ok(true)
}

/// Remove a rule by exact key. Returns whether the config changed.
pub fn delete_rule<D>(store: &mut ConfigStore, dialogs: &mut D) -> ConfigResult<bool>
where
    D: Dialogs + ?Sized,
{
    let Some(key) = dialogs.prompt(DELETE_PROMPT) else {
        return Ok(false);
    };
    let key = key.trim();
    if key.is_empty() {
        return Ok(false);
    }

    if store.config().rule(key).is_none() {
        dialogs.warn("That setting was not found.");
        return Ok(false);
    }

    store.commit(|config| {
        config.remove(key);
    })?;
    tracing::info!(rule = key, "rule deleted");

    dialogs.info("The setting was deleted.");
    Ok(true)
}

/// Show the configured rule keys
pub fn list_rules<D>(store: &ConfigStore, dialogs: &mut D)
where
    D: Dialogs + ?Sized,
{
    dialogs.info(&store.config().keys().join(", "));
}

pub fn credits_text() -> String {
    format!(
        "# {APP_NAME} {version}\n\
         Written in Rust\n\n\
         # Libraries\n\
         windows, image, rfd, serde, serde_json,\n\
         crossbeam-channel, parking_lot, tracing,\n\
         anyhow, thiserror, once_cell\n\
         Video decoding by FFmpeg (ffmpeg.org)",
        version = env!("CARGO_PKG_VERSION"),
    )
}

pub fn show_credits<D>(dialogs: &mut D)
where
    D: Dialogs + ?Sized,
{
    dialogs.info(&credits_text());
}
