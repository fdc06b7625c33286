//! Audio pipeline — capture session → FIFO queue → resampler → recognizer,
//! with a loudness meter tapped off the capture callback.
//!
//! ```text
//! Microphone → cpal callback ─┬─▶ mpsc queue ─▶ stop() drain ─▶ resample
//!                             └─▶ LevelState ─▶ LevelEmitter (40 ms ticks)
//! ```

pub mod capture;
pub mod level;
pub mod resample;

pub use capture::{BlockCallback, CaptureError, CaptureSession, CpalInput, InputSource, InputStream};
pub use level::{instant_level, LevelEmitter, LevelState};
pub use resample::resample;
