//! Transcript delivery — paste-swap with typing fallback.
//!
//! # Paste-swap
//!
//! Inserting text into an arbitrary focused application is most reliable via
//! the clipboard:
//!
//! 1. **Snapshot** the current clipboard text (best-effort; absence is fine).
//! 2. **Write** the transcript to the clipboard, retrying with short backoff
//!    — clipboard ownership can be transiently held by other processes.
//! 3. **Paste** via the platform shortcut, wait a short settle interval for
//!    the target app to consume it.
//! 4. **Restore** the snapshot (best-effort, bounded retries).
//!
//! Any hard failure along the way degrades to direct synthetic typing.
//! [`TranscriptDelivery::deliver`] never panics and never surfaces an error
//! to the orchestrator — a failed delivery is logged, not fatal.

pub mod clipboard;
pub mod injector;

pub use clipboard::SystemClipboard;
pub use injector::EnigoInjector;

use std::str::FromStr;
use std::time::{Duration, Instant};

use thiserror::Error;

// ---------------------------------------------------------------------------
// DeliverError
// ---------------------------------------------------------------------------

/// Errors from the platform input-injection layer.
#[derive(Debug, Error)]
pub enum DeliverError {
    /// The injection backend could not be initialised or a key event was
    /// rejected.
    #[error("cannot simulate input: {0}")]
    Injection(String),
}

// ---------------------------------------------------------------------------
// PasteMode
// ---------------------------------------------------------------------------

/// Delivery strategy, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteMode {
    /// Prefer paste-swap, freely fall back to typing.  The default.
    Auto,
    /// Insist on paste-swap; typing remains the degraded last resort, logged
    /// as such.
    Clipboard,
    /// Always type, never touch the clipboard.
    Typing,
}

impl FromStr for PasteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "clipboard" => Ok(Self::Clipboard),
            "typing" => Ok(Self::Typing),
            other => Err(format!(
                "unknown paste mode {other:?} (expected auto|clipboard|typing)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform capability traits
// ---------------------------------------------------------------------------

/// Clipboard text primitives.
pub trait Clipboard: Send + Sync {
    /// Current clipboard text; `None` when empty, non-text, or unreadable.
    fn read_text(&self) -> Option<String>;

    /// Replace the clipboard text.  Returns `false` on failure.
    fn write_text(&self, text: &str) -> bool;
}

/// Synthetic input primitives.
pub trait TextInjector: Send + Sync {
    /// Send the platform paste shortcut to the focused window.
    fn send_paste_shortcut(&self) -> Result<(), DeliverError>;

    /// Type `text` directly as synthetic key events.
    fn type_text(&self, text: &str) -> Result<(), DeliverError>;
}

// ---------------------------------------------------------------------------
// DeliveryTiming
// ---------------------------------------------------------------------------

/// Retry/settle intervals for the paste-swap sequence.
///
/// Production uses [`DeliveryTiming::default`]; tests shrink everything so
/// the retry deadline elapses in microseconds.
#[derive(Debug, Clone)]
pub struct DeliveryTiming {
    /// Total budget for getting the transcript onto the clipboard.
    pub write_deadline: Duration,
    /// Backoff between clipboard write attempts.
    pub write_backoff: Duration,
    /// Wait after the paste shortcut before touching the clipboard again.
    pub settle: Duration,
    /// Attempts to restore the snapshot.
    pub restore_retries: u32,
    /// Backoff between restore attempts.
    pub restore_backoff: Duration,
}

impl Default for DeliveryTiming {
    fn default() -> Self {
        Self {
            write_deadline: Duration::from_millis(500),
            write_backoff: Duration::from_millis(10),
            settle: Duration::from_millis(80),
            restore_retries: 5,
            restore_backoff: Duration::from_millis(10),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptDelivery
// ---------------------------------------------------------------------------

/// Delivers transcripts into the focused application.
pub struct TranscriptDelivery {
    clipboard: Box<dyn Clipboard>,
    injector: Box<dyn TextInjector>,
    mode: PasteMode,
    timing: DeliveryTiming,
}

impl TranscriptDelivery {
    pub fn new(
        clipboard: Box<dyn Clipboard>,
        injector: Box<dyn TextInjector>,
        mode: PasteMode,
    ) -> Self {
        Self::with_timing(clipboard, injector, mode, DeliveryTiming::default())
    }

    pub fn with_timing(
        clipboard: Box<dyn Clipboard>,
        injector: Box<dyn TextInjector>,
        mode: PasteMode,
        timing: DeliveryTiming,
    ) -> Self {
        Self {
            clipboard,
            injector,
            mode,
            timing,
        }
    }

    /// Insert `text` (plus a trailing space delimiter) at the focus point of
    /// the active application.
    ///
    /// Returns once the attempt — successful or not — is complete.  Never
    /// panics, never leaves the clipboard permanently altered, never reports
    /// an error to the caller: delivery failures are logged and swallowed.
    pub fn deliver(&self, text: &str) {
        let text = format!("{text} ");

        if self.mode == PasteMode::Typing {
            self.type_out(&text);
            return;
        }

        if self.paste_swap(&text) {
            return;
        }

        match self.mode {
            PasteMode::Clipboard => {
                log::warn!("clipboard delivery failed; degrading to typing fallback")
            }
            _ => log::debug!("paste method: fallback-typing"),
        }
        self.type_out(&text);
    }

    // -----------------------------------------------------------------------
    // Paste-swap sequence
    // -----------------------------------------------------------------------

    fn paste_swap(&self, text: &str) -> bool {
        let snapshot = self.clipboard.read_text();

        if !self.write_with_retry(text) {
            log::debug!("clipboard write failed within the deadline");
            return false;
        }
        log::debug!("paste method: clipboard");

        if let Err(e) = self.injector.send_paste_shortcut() {
            log::warn!("paste shortcut rejected: {e}");
            // The clipboard currently holds our text; put the user's content
            // back before falling back to typing.
            self.restore(snapshot);
            return false;
        }

        std::thread::sleep(self.timing.settle);
        self.restore(snapshot);
        true
    }

    /// Retry the clipboard write until it succeeds or the deadline passes.
    fn write_with_retry(&self, text: &str) -> bool {
        let deadline = Instant::now() + self.timing.write_deadline;
        loop {
            if self.clipboard.write_text(text) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.timing.write_backoff);
        }
    }

    /// Best-effort restore of the snapshot; a `None` snapshot (nothing was
    /// readable before the swap) leaves the clipboard as-is.
    fn restore(&self, snapshot: Option<String>) {
        let Some(previous) = snapshot else { return };
        for attempt in 0..self.timing.restore_retries {
            if self.clipboard.write_text(&previous) {
                return;
            }
            if attempt + 1 < self.timing.restore_retries {
                std::thread::sleep(self.timing.restore_backoff);
            }
        }
        log::warn!("could not restore previous clipboard content");
    }

    fn type_out(&self, text: &str) {
        if let Err(e) = self.injector.type_text(text) {
            log::warn!("typing fallback failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::Arc;

    fn delivery(
        clipboard: Arc<FakeClipboard>,
        injector: Arc<FakeInjector>,
        mode: PasteMode,
    ) -> TranscriptDelivery {
        // The Arc wrappers let tests keep inspecting the fakes after the
        // delivery takes ownership of its trait objects.
        struct CbRef(Arc<FakeClipboard>);
        impl Clipboard for CbRef {
            fn read_text(&self) -> Option<String> {
                self.0.read_text()
            }
            fn write_text(&self, text: &str) -> bool {
                self.0.write_text(text)
            }
        }
        struct InjRef(Arc<FakeInjector>);
        impl TextInjector for InjRef {
            fn send_paste_shortcut(&self) -> Result<(), DeliverError> {
                self.0.send_paste_shortcut()
            }
            fn type_text(&self, text: &str) -> Result<(), DeliverError> {
                self.0.type_text(text)
            }
        }

        TranscriptDelivery::with_timing(
            Box::new(CbRef(clipboard)),
            Box::new(InjRef(injector)),
            mode,
            fast_timing(),
        )
    }

    #[test]
    fn paste_mode_parses() {
        assert_eq!("auto".parse::<PasteMode>().unwrap(), PasteMode::Auto);
        assert_eq!(
            "clipboard".parse::<PasteMode>().unwrap(),
            PasteMode::Clipboard
        );
        assert_eq!("typing".parse::<PasteMode>().unwrap(), PasteMode::Typing);
        assert!("Auto".parse::<PasteMode>().is_err());
    }

    #[test]
    fn successful_paste_restores_snapshot() {
        let cb = Arc::new(FakeClipboard::with_content(Some("user stuff")));
        let inj = Arc::new(FakeInjector::new());
        delivery(Arc::clone(&cb), Arc::clone(&inj), PasteMode::Auto).deliver("hello");

        assert_eq!(inj.paste_count(), 1);
        assert!(inj.typed().is_empty());
        // The transcript was written, then the user's content put back.
        let writes = cb.writes.lock().unwrap().clone();
        assert_eq!(writes, vec!["hello ".to_string(), "user stuff".to_string()]);
        assert_eq!(cb.current().as_deref(), Some("user stuff"));
    }

    #[test]
    fn empty_snapshot_skips_restore() {
        let cb = Arc::new(FakeClipboard::with_content(None));
        let inj = Arc::new(FakeInjector::new());
        delivery(Arc::clone(&cb), inj, PasteMode::Auto).deliver("hi");

        // One write (the transcript), no restore write.
        assert_eq!(cb.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn transient_write_failures_are_retried() {
        let cb = Arc::new(FakeClipboard::failing_first(2, Some("prev")));
        let inj = Arc::new(FakeInjector::new());
        delivery(Arc::clone(&cb), Arc::clone(&inj), PasteMode::Auto).deliver("text");

        assert_eq!(inj.paste_count(), 1, "retry should eventually paste");
        assert!(inj.typed().is_empty());
    }

    #[test]
    fn dead_clipboard_falls_back_to_typing() {
        let inj = Arc::new(FakeInjector::new());
        struct InjRef(Arc<FakeInjector>);
        impl TextInjector for InjRef {
            fn send_paste_shortcut(&self) -> Result<(), DeliverError> {
                self.0.send_paste_shortcut()
            }
            fn type_text(&self, text: &str) -> Result<(), DeliverError> {
                self.0.type_text(text)
            }
        }
        let d = TranscriptDelivery::with_timing(
            Box::new(DeadClipboard),
            Box::new(InjRef(Arc::clone(&inj))),
            PasteMode::Auto,
            fast_timing(),
        );

        // Must not panic, must not error — and must end in the typing path.
        d.deliver("hello");
        assert_eq!(inj.paste_count(), 0);
        assert_eq!(inj.typed(), vec!["hello ".to_string()]);
    }

    #[test]
    fn clipboard_mode_still_falls_back_on_hard_failure() {
        let inj = Arc::new(FakeInjector::new());
        struct InjRef(Arc<FakeInjector>);
        impl TextInjector for InjRef {
            fn send_paste_shortcut(&self) -> Result<(), DeliverError> {
                self.0.send_paste_shortcut()
            }
            fn type_text(&self, text: &str) -> Result<(), DeliverError> {
                self.0.type_text(text)
            }
        }
        let d = TranscriptDelivery::with_timing(
            Box::new(DeadClipboard),
            Box::new(InjRef(Arc::clone(&inj))),
            PasteMode::Clipboard,
            fast_timing(),
        );
        d.deliver("hello");
        assert_eq!(inj.typed(), vec!["hello ".to_string()]);
    }

    #[test]
    fn typing_mode_never_touches_the_clipboard() {
        let cb = Arc::new(FakeClipboard::with_content(Some("keep me")));
        let inj = Arc::new(FakeInjector::new());
        delivery(Arc::clone(&cb), Arc::clone(&inj), PasteMode::Typing).deliver("hello");

        assert!(cb.writes.lock().unwrap().is_empty());
        assert_eq!(inj.paste_count(), 0);
        assert_eq!(inj.typed(), vec!["hello ".to_string()]);
    }

    #[test]
    fn rejected_paste_shortcut_restores_then_types() {
        let cb = Arc::new(FakeClipboard::with_content(Some("prev")));
        let inj = Arc::new(FakeInjector::rejecting_paste());
        delivery(Arc::clone(&cb), Arc::clone(&inj), PasteMode::Auto).deliver("hello");

        // Snapshot restored even though the paste never happened…
        assert_eq!(cb.current().as_deref(), Some("prev"));
        // …and the transcript arrived by typing instead.
        assert_eq!(inj.typed(), vec!["hello ".to_string()]);
    }

    #[test]
    fn trailing_delimiter_is_appended() {
        let cb = Arc::new(FakeClipboard::with_content(None));
        let inj = Arc::new(FakeInjector::new());
        delivery(Arc::clone(&cb), inj, PasteMode::Auto).deliver("word");
        assert_eq!(cb.writes.lock().unwrap()[0], "word ");
    }
}
