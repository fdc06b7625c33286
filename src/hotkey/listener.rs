//! Dedicated OS-thread key listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread —
//! it cannot run inside a tokio task.  [`HotkeyListener::start`] spawns that
//! thread; every press/release updates the shared [`HotkeyStateMachine`],
//! and resulting [`Transition`]s are forwarded over a tokio channel with
//! `blocking_send`.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has no graceful shutdown API.  Dropping the handle sets a
//! stop flag so the callback discards further events; the OS thread itself
//! remains blocked in the rdev loop until the process exits, holding no
//! resources that need cleanup.
//!
//! # Hook failure is fatal
//!
//! Failure to subscribe to the OS hook is the one unrecoverable condition in
//! this process — without key events the engine can never do anything.  The
//! listener thread logs a diagnostic and exits the process.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{HotkeyStateMachine, Transition};

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to the running listener thread.
///
/// `drive_transitions` selects event mode (`true`: presses and releases also
/// fire Begin/End through the state machine) versus polling mode (`false`:
/// the listener only maintains the pressed-key set and [`super::PollWatcher`]
/// owns the transitions).
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    /// Never joined — `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(
        machine: Arc<HotkeyStateMachine>,
        tx: mpsc::Sender<Transition>,
        drive_transitions: bool,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }

                    let transition = match event.event_type {
                        rdev::EventType::KeyPress(key) => {
                            if drive_transitions {
                                machine.on_key_press(key)
                            } else {
                                machine.note_press(key);
                                None
                            }
                        }
                        rdev::EventType::KeyRelease(key) => {
                            if drive_transitions {
                                machine.on_key_release(key)
                            } else {
                                machine.note_release(key);
                                None
                            }
                        }
                        _ => None,
                    };

                    if let Some(t) = transition {
                        // blocking_send is safe from this non-async thread.
                        let _ = tx.blocking_send(t);
                    }
                });

                if let Err(e) = result {
                    // No hook means no input, ever — abort with a clear
                    // diagnostic rather than running deaf.
                    log::error!(
                        "hotkey-listener: failed to subscribe to the OS key hook: {e:?}; \
                         the engine cannot run without it"
                    );
                    std::process::exit(1);
                }
            })
            .expect("failed to spawn hotkey-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
