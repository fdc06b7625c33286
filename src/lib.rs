//! Push-to-talk dictation engine.
//!
//! Hold Ctrl+Shift (any left/right variant), speak, release — the buffered
//! audio is transcribed and the text is inserted into whatever application
//! has focus.  The process is driven by a host over stdout: every internal
//! transition is serialized as one JSON object per line (see
//! [`events::HostEvent`]).
//!
//! # Architecture
//!
//! ```text
//! OS hook ─▶ HotkeyStateMachine ─▶ Engine run loop
//!                                   ├─ begin: CaptureSession.start + LevelEmitter
//!                                   │         (cpal callback → queue + LevelState)
//!                                   └─ end:   drain → resample → Recognizer
//!                                             → TranscriptDelivery → transcript event
//! ```
//!
//! Platform collaborators (audio device, keyboard hook, clipboard, synthetic
//! input, recognizer) sit behind narrow traits so the whole pipeline runs
//! against fakes in tests.

pub mod asr;
pub mod audio;
pub mod config;
pub mod deliver;
pub mod engine;
pub mod events;
pub mod hotkey;

pub use config::Config;
pub use engine::Engine;
