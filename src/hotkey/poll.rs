//! Polling-mode hotkey detection with dwell debouncing.
//!
//! Some OS/driver combinations deliver hook events unreliably (missed
//! releases, auto-repeat storms).  In polling mode a dedicated thread
//! samples combo-down state every [`POLL_PERIOD`] and only accepts a state
//! change after it has been observed continuously for a dwell window:
//! [`DWELL_DOWN`] to confirm engagement, [`DWELL_UP`] to confirm release.
//! The asymmetry favors quick engagement while avoiding clipping the tail
//! of speech on a momentary key bounce.
//!
//! [`PollDebouncer`] is the pure dwell logic (fully testable with synthetic
//! clocks); [`PollWatcher`] is the thread that runs it against a
//! [`KeyStateProbe`] and routes confirmed edges through the shared
//! [`HotkeyStateMachine`] so event mode and polling mode can never
//! double-fire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{HotkeyStateMachine, Transition};

// ---------------------------------------------------------------------------
// Timing constants — empirically tuned, preserved as-is
// ---------------------------------------------------------------------------

/// Sampling interval.
pub const POLL_PERIOD: Duration = Duration::from_millis(10);

/// Continuous observation required to confirm combo-down.
pub const DWELL_DOWN: Duration = Duration::from_millis(30);

/// Continuous observation required to confirm combo-up.
pub const DWELL_UP: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// KeyStateProbe
// ---------------------------------------------------------------------------

/// Samples whether the combo is physically held right now.
///
/// Production binds [`MachineProbe`], which reads the pressed-key set the
/// rdev listener maintains (rdev exposes no key-state query API); tests
/// drive the debouncer with synthetic state.
pub trait KeyStateProbe: Send {
    fn combo_down(&self) -> bool;
}

/// Probe over the listener-maintained pressed set.
pub struct MachineProbe {
    machine: Arc<HotkeyStateMachine>,
}

impl MachineProbe {
    pub fn new(machine: Arc<HotkeyStateMachine>) -> Self {
        Self { machine }
    }
}

impl KeyStateProbe for MachineProbe {
    fn combo_down(&self) -> bool {
        self.machine.combo_down()
    }
}

// ---------------------------------------------------------------------------
// PollDebouncer
// ---------------------------------------------------------------------------

/// Dwell-window edge confirmation.
///
/// Feed it one sample per tick; it returns a confirmed edge only after the
/// new state has been continuously observed for the full dwell window.  A
/// single contradicting sample restarts the window, so coincidental
/// one-sample key overlaps never fire.
#[derive(Debug)]
pub struct PollDebouncer {
    /// Last confirmed state (`true` = combo down).
    confirmed: bool,
    /// When the current candidate state was first observed.
    candidate_since: Option<Instant>,
}

impl PollDebouncer {
    pub fn new() -> Self {
        Self {
            confirmed: false,
            candidate_since: None,
        }
    }

    /// Process one sample taken at `now`.  Returns the newly confirmed state
    /// when an edge fires, `None` otherwise.
    pub fn tick(&mut self, combo_down: bool, now: Instant) -> Option<bool> {
        if combo_down == self.confirmed {
            // Back at (or still in) the confirmed state — any pending
            // candidate was transient noise.
            self.candidate_since = None;
            return None;
        }

        let since = *self.candidate_since.get_or_insert(now);
        let dwell = if combo_down { DWELL_DOWN } else { DWELL_UP };

        if now.duration_since(since) >= dwell {
            self.confirmed = combo_down;
            self.candidate_since = None;
            Some(combo_down)
        } else {
            None
        }
    }
}

impl Default for PollDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// PollWatcher
// ---------------------------------------------------------------------------

/// Background thread sampling a [`KeyStateProbe`] every [`POLL_PERIOD`].
///
/// Confirmed edges go through [`HotkeyStateMachine::try_activate`] /
/// [`try_deactivate`] (the shared check-then-set region) before a
/// [`Transition`] is forwarded, so a duplicate edge from the event path is
/// silently absorbed.
///
/// [`try_deactivate`]: HotkeyStateMachine::try_deactivate
pub struct PollWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PollWatcher {
    pub fn start(
        probe: Box<dyn KeyStateProbe>,
        machine: Arc<HotkeyStateMachine>,
        tx: mpsc::Sender<Transition>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("hotkey-poll".into())
                .spawn(move || {
                    let mut debouncer = PollDebouncer::new();
                    while !stop.load(Ordering::Relaxed) {
                        if let Some(down) = debouncer.tick(probe.combo_down(), Instant::now()) {
                            let transition = if down {
                                machine.try_activate()
                            } else {
                                machine.try_deactivate()
                            };
                            if let Some(t) = transition {
                                let _ = tx.blocking_send(t);
                            }
                        }
                        thread::sleep(POLL_PERIOD);
                    }
                })
                .expect("failed to spawn hotkey-poll thread")
        };

        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Signal the loop and join it (it sleeps at most [`POLL_PERIOD`]).
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PollWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
