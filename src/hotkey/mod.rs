//! Hotkey edge detection for push-to-talk.
//!
//! [`HotkeyStateMachine`] turns raw key events (or polled key state) into
//! clean [`Transition::Begin`] / [`Transition::End`] edges, exactly one per
//! physical gesture.
//!
//! # Input modes
//!
//! * **Event mode** (default): [`HotkeyListener`] feeds every press/release
//!   from the OS hook into the machine, which recomputes the combo after
//!   each update.
//! * **Polling mode**: on platforms where the hook cannot observe physical
//!   key state reliably, [`PollWatcher`] samples key-down state every 10 ms
//!   and debounces transitions through [`PollDebouncer`] dwell windows.
//!
//! Both modes funnel through the same mutex-guarded check-then-set on the
//! active flag, so begin/end can never double-fire even if both paths are
//! alive at once.

pub mod combo;
pub mod listener;
pub mod poll;

pub use combo::{HotkeyCombo, Role};
pub use listener::HotkeyListener;
pub use poll::{PollDebouncer, PollWatcher};

use std::collections::HashSet;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A debounced dictation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The combo went down — begin dictation.
    Begin,
    /// The combo was released — end dictation.
    End,
}

// ---------------------------------------------------------------------------
// HotkeyStateMachine
// ---------------------------------------------------------------------------

/// Idle ↔ Active edge detector over a [`HotkeyCombo`].
///
/// The pressed-key set and the active flag live behind separate mutexes: the
/// set is only ever touched by the listener (or polling) thread, while the
/// flag is the single state-mutating region shared by both input modes.
pub struct HotkeyStateMachine {
    combo: HotkeyCombo,
    pressed: Mutex<HashSet<rdev::Key>>,
    active: Mutex<bool>,
}

impl HotkeyStateMachine {
    pub fn new(combo: HotkeyCombo) -> Self {
        Self {
            combo,
            pressed: Mutex::new(HashSet::new()),
            active: Mutex::new(false),
        }
    }

    // -----------------------------------------------------------------------
    // Event mode
    // -----------------------------------------------------------------------

    /// Record a key press and fire `Begin` if this press completed the combo
    /// while the machine was idle.
    pub fn on_key_press(&self, key: rdev::Key) -> Option<Transition> {
        if self.note_press(key) {
            self.try_activate()
        } else {
            None
        }
    }

    /// Record a key release and fire `End` if this release broke the combo
    /// while the machine was active.
    pub fn on_key_release(&self, key: rdev::Key) -> Option<Transition> {
        if self.note_release(key) {
            None
        } else {
            self.try_deactivate()
        }
    }

    // -----------------------------------------------------------------------
    // Pressed-set bookkeeping (shared with polling mode)
    // -----------------------------------------------------------------------

    /// Update the pressed set for a press; returns whether the combo is now
    /// satisfied.  Does not touch the active flag.
    pub fn note_press(&self, key: rdev::Key) -> bool {
        let mut pressed = self.pressed.lock().unwrap();
        pressed.insert(key);
        self.combo.is_satisfied(&pressed)
    }

    /// Update the pressed set for a release; returns whether the combo is
    /// still satisfied.  Does not touch the active flag.
    pub fn note_release(&self, key: rdev::Key) -> bool {
        let mut pressed = self.pressed.lock().unwrap();
        pressed.remove(&key);
        self.combo.is_satisfied(&pressed)
    }

    /// Whether the combo is satisfied by the current pressed set.  The
    /// polling-mode probe samples this.
    pub fn combo_down(&self) -> bool {
        self.combo.is_satisfied(&self.pressed.lock().unwrap())
    }

    // -----------------------------------------------------------------------
    // Active flag — the single state-mutating region
    // -----------------------------------------------------------------------

    /// Check-then-set Idle→Active.  Returns `Begin` exactly once per edge.
    pub fn try_activate(&self) -> Option<Transition> {
        let mut active = self.active.lock().unwrap();
        if *active {
            None
        } else {
            *active = true;
            Some(Transition::Begin)
        }
    }

    /// Check-then-set Active→Idle.  Returns `End` exactly once per edge.
    pub fn try_deactivate(&self) -> Option<Transition> {
        let mut active = self.active.lock().unwrap();
        if *active {
            *active = false;
            Some(Transition::End)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
