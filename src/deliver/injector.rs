//! Synthetic input binding backed by the `enigo` crate.
//!
//! | Platform | Paste shortcut |
//! |----------|----------------|
//! | macOS    | ⌘V (Meta + V)  |
//! | Windows  | Ctrl+V         |
//! | Linux    | Ctrl+V         |
//!
//! A new [`enigo::Enigo`] instance is created per call because `Enigo` is
//! not `Send` and the handle is cheap to construct.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::{DeliverError, TextInjector};

/// Production [`TextInjector`] over `enigo`.
pub struct EnigoInjector;

impl EnigoInjector {
    fn backend() -> Result<Enigo, DeliverError> {
        Enigo::new(&Settings::default()).map_err(|e| DeliverError::Injection(e.to_string()))
    }
}

impl TextInjector for EnigoInjector {
    fn send_paste_shortcut(&self) -> Result<(), DeliverError> {
        let mut enigo = Self::backend()?;

        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        enigo
            .key(modifier, Direction::Press)
            .map_err(|e| DeliverError::Injection(e.to_string()))?;
        let result = enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| DeliverError::Injection(e.to_string()));
        // Release the modifier even when the click failed, or the user is
        // left with a stuck Ctrl/⌘ key.
        let release = enigo
            .key(modifier, Direction::Release)
            .map_err(|e| DeliverError::Injection(e.to_string()));

        result.and(release)
    }

    fn type_text(&self, text: &str) -> Result<(), DeliverError> {
        Self::backend()?
            .text(text)
            .map_err(|e| DeliverError::Injection(e.to_string()))
    }
}
