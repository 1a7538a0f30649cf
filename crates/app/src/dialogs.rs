//! Native message boxes and file picker

use crate::prompt;
use crate::settings::Dialogs;
use crate::APP_NAME;
use media::{ANIMATION_EXTENSIONS, VIDEO_EXTENSIONS};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use std::path::PathBuf;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// [`Dialogs`] shown as modal Win32 windows on the UI thread
#[derive(Debug, Default)]
pub struct NativeDialogs;

impl NativeDialogs {
    fn message(&self, level: MessageLevel, text: &str) {
        let _ = MessageDialog::new()
            .set_title(APP_NAME)
            .set_description(text)
            .set_level(level)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

impl Dialogs for NativeDialogs {
    fn prompt(&mut self, message: &str) -> Option<String> {
        match prompt::ask(APP_NAME, message) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "text prompt failed");
                None
            }
        }
    }

    fn pick_media(&mut self) -> Option<PathBuf> {
        let all: Vec<&str> = IMAGE_EXTENSIONS
            .iter()
            .chain(ANIMATION_EXTENSIONS)
            .chain(VIDEO_EXTENSIONS)
            .copied()
            .collect();

        FileDialog::new()
            .set_title(format!("{APP_NAME} - Choose wallpaper"))
            .add_filter("Wallpaper", &all[..])
            .add_filter("Image", IMAGE_EXTENSIONS)
            .add_filter("Video", VIDEO_EXTENSIONS)
            .pick_file()
    }

    fn info(&mut self, message: &str) {
        self.message(MessageLevel::Info, message);
    }

    fn warn(&mut self, message: &str) {
        self.message(MessageLevel::Warning, message);
    }
}
