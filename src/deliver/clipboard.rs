//! System clipboard binding backed by the `arboard` crate.
//!
//! A short-lived [`arboard::Clipboard`] handle is created per call rather
//! than shared, because `arboard::Clipboard` is not `Send` on all platforms
//! and the handle is cheap to create.

use super::Clipboard;

/// Production [`Clipboard`] over `arboard`.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Option<String> {
        // get_text errs when the clipboard is empty or holds non-text data
        // (e.g. an image) — both are "no snapshot", not failures.
        arboard::Clipboard::new().ok()?.get_text().ok()
    }

    fn write_text(&self, text: &str) -> bool {
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("clipboard set_text failed: {e}");
                    false
                }
            },
            Err(e) => {
                log::debug!("clipboard unavailable: {e}");
                false
            }
        }
    }
}
