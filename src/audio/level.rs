//! Loudness metering for the host overlay indicator.
//!
//! Two halves, joined by [`LevelState`]:
//!
//! * the cpal callback computes [`instant_level`] per block and stores it —
//!   a single mutex-guarded `f32` write, nothing that can stall the
//!   real-time audio thread;
//! * a [`LevelEmitter`] thread, alive only while a session is recording,
//!   reads the latest raw level every 40 ms, applies asymmetric exponential
//!   smoothing, and emits an `overlay_level` event **every tick** — so the
//!   host animates smoothly across silent gaps where no audio arrived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::events::{EventSink, HostEvent};

// ---------------------------------------------------------------------------
// Tuning constants
// ---------------------------------------------------------------------------

/// Gain applied to the RMS before soft saturation.  Chosen so quiet speech
/// still moves the indicator; empirically tuned, do not re-derive.
pub const LEVEL_GAIN: f32 = 22.0;

/// Emitter tick period.
pub const EMIT_PERIOD: Duration = Duration::from_millis(40);

/// Blend factor for a rising level (fast attack).
pub const ATTACK: f32 = 0.45;

/// Blend factor for a falling level (slow release).
pub const RELEASE: f32 = 0.15;

/// Upper bound on waiting for the emitter thread to exit.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// instant_level
// ---------------------------------------------------------------------------

/// Instantaneous loudness of one audio block, in `[0, 1]`.
///
/// `rms = sqrt(mean(block²))`, then gain and soft saturation:
/// `1 - exp(-rms * 22)`.  The exponential compresses the dynamic range so the
/// indicator is visible for quiet speech while loud input pins at 1.0 instead
/// of clipping.
pub fn instant_level(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let mean_sq = block.iter().map(|s| s * s).sum::<f32>() / block.len() as f32;
    let rms = mean_sq.sqrt();
    (1.0 - (-rms * LEVEL_GAIN).exp()).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// LevelState
// ---------------------------------------------------------------------------

/// Latest raw level, shared between the capture callback (writer) and the
/// emitter loop (reader).
///
/// Guarded by its own mutex, independent of the capture-session lock, so
/// level reads never serialize behind stream open/close.
pub struct LevelState {
    latest: Mutex<f32>,
}

impl LevelState {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(0.0),
        }
    }

    /// Store a new raw level, clamped to `[0, 1]`.
    pub fn set(&self, level: f32) {
        *self.latest.lock().unwrap() = level.clamp(0.0, 1.0);
    }

    /// Read the latest raw level.
    pub fn get(&self) -> f32 {
        *self.latest.lock().unwrap()
    }

    /// Reset to silence (session end).
    pub fn reset(&self) {
        self.set(0.0);
    }
}

impl Default for LevelState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// smooth
// ---------------------------------------------------------------------------

/// One smoothing step: fast attack when the target is above the current
/// value, slow release otherwise.
fn smooth(current: f32, target: f32) -> f32 {
    if target > current {
        current * (1.0 - ATTACK) + target * ATTACK
    } else {
        current * (1.0 - RELEASE) + target * RELEASE
    }
}

// ---------------------------------------------------------------------------
// LevelEmitter
// ---------------------------------------------------------------------------

/// Background thread that turns raw levels into a steady stream of
/// `overlay_level` events.
///
/// Started with [`LevelEmitter::start`] when recording begins; [`stop`]
/// signals the loop, waits up to [`STOP_TIMEOUT`] for it to exit, resets the
/// shared level, and emits one final `overlay_level` of `0.0` so the host
/// always resets its indicator.
///
/// [`stop`]: LevelEmitter::stop
pub struct LevelEmitter {
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    level: Arc<LevelState>,
    sink: Arc<dyn EventSink>,
}

impl LevelEmitter {
    /// Spawn the emitter thread.  Resets `level` to silence first so a new
    /// session never starts from the previous session's last loudness.
    pub fn start(level: Arc<LevelState>, sink: Arc<dyn EventSink>) -> Self {
        level.reset();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop_flag);
            let level = Arc::clone(&level);
            let sink = Arc::clone(&sink);

            thread::Builder::new()
                .name("level-emitter".into())
                .spawn(move || {
                    let mut smoothed = 0.0_f32;
                    while !stop.load(Ordering::Relaxed) {
                        smoothed = smooth(smoothed, level.get());
                        sink.emit(HostEvent::OverlayLevel { level: smoothed });
                        thread::sleep(EMIT_PERIOD);
                    }
                })
                .expect("failed to spawn level-emitter thread")
        };

        Self {
            stop_flag,
            thread: Some(thread),
            level,
            sink,
        }
    }

    /// Stop the loop, reset the level, and emit the final `0.0`.
    ///
    /// The join is bounded: if the thread has not exited within
    /// [`STOP_TIMEOUT`] it is detached rather than hanging shutdown.  (The
    /// loop only sleeps [`EMIT_PERIOD`] between flag checks, so in practice
    /// it exits well inside the window.)
    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);

        if let Some(handle) = self.thread.take() {
            let deadline = std::time::Instant::now() + STOP_TIMEOUT;
            while !handle.is_finished() && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::warn!("level-emitter did not exit within {STOP_TIMEOUT:?}; detaching");
            }
        }

        self.level.reset();
        self.sink.emit(HostEvent::OverlayLevel { level: 0.0 });
    }
}

impl Drop for LevelEmitter {
    fn drop(&mut self) {
        // stop() takes self by value; this only covers the forgotten-handle
        // path so the thread never outlives its owner silently.
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
