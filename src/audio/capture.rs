//! Microphone capture session.
//!
//! [`CaptureSession`] owns the start/stop lifecycle of one recording at a
//! time.  The device layer is abstracted behind [`InputSource`] so the
//! session (and everything above it) can be exercised with a fake source in
//! tests; [`CpalInput`] is the production binding.
//!
//! # Data flow
//!
//! The capture callback runs on the real-time audio thread and does exactly
//! two things per delivered block: push a copy onto an mpsc queue consumed by
//! [`CaptureSession::stop`], and write the block's instantaneous loudness to
//! the shared [`LevelState`].  Both are non-blocking — the audio thread must
//! never wait on the processing stage.
//!
//! Each `start` creates a **fresh** channel, so residual blocks from a
//! previous session can never leak into the next one.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::level::{instant_level, LevelState};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("audio-stream thread failed: {0}")]
    StreamThread(String),
}

// ---------------------------------------------------------------------------
// InputSource / InputStream
// ---------------------------------------------------------------------------

/// Callback invoked with each mono `f32` block from the device.
pub type BlockCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Handle to an open input stream.  Closing it stops capture and releases
/// the device.
pub trait InputStream: Send {
    fn close(self: Box<Self>);
}

/// Narrow capability interface over the platform audio layer.
///
/// Production code binds [`CpalInput`]; tests bind a fake that feeds
/// synthetic blocks through the callback.
pub trait InputSource: Send + Sync {
    /// Default input device sample rate in Hz, or `None` when the query
    /// fails (no device, backend error).
    fn default_sample_rate(&self) -> Option<u32>;

    /// Open a mono input stream at `sample_rate` and begin delivering blocks
    /// to `callback`.
    fn open_stream(
        &self,
        sample_rate: u32,
        callback: BlockCallback,
    ) -> Result<Box<dyn InputStream>, CaptureError>;
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

struct ActiveCapture {
    stream: Box<dyn InputStream>,
    queue: mpsc::Receiver<Vec<f32>>,
    sample_rate: u32,
}

/// One-at-a-time recording session over an [`InputSource`].
///
/// `start`/`stop` are guarded by a single mutex so concurrent callers cannot
/// race the stream lifecycle.  The level scalar is deliberately *not* behind
/// that mutex — see [`LevelState`].
pub struct CaptureSession {
    source: Box<dyn InputSource>,
    level: Arc<LevelState>,
    /// Used when the device rate query fails (the recognizer's fixed rate).
    fallback_rate: u32,
    active: Mutex<Option<ActiveCapture>>,
}

impl CaptureSession {
    pub fn new(source: Box<dyn InputSource>, level: Arc<LevelState>, fallback_rate: u32) -> Self {
        Self {
            source,
            level,
            fallback_rate,
            active: Mutex::new(None),
        }
    }

    /// Open the input stream at the device's current default rate and begin
    /// capturing.  Returns the resolved sample rate on success.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyActive`] when a session is already open, or
    /// whatever the source reports when the stream cannot be opened.  A rate
    /// *query* failure is not an error — capture falls back to
    /// `fallback_rate` and logs a warning.
    pub fn start(&self) -> Result<u32, CaptureError> {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let sample_rate = self.source.default_sample_rate().unwrap_or_else(|| {
            log::warn!(
                "could not read input sample rate; defaulting to {} Hz",
                self.fallback_rate
            );
            self.fallback_rate
        });

        // Fresh channel per session: clears any residual queued audio.
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let level = Arc::clone(&self.level);
        let callback: BlockCallback = Box::new(move |block: &[f32]| {
            level.set(instant_level(block));
            // Receiver dropped means the session is being torn down — ignore.
            let _ = tx.send(block.to_vec());
        });

        let stream = self.source.open_stream(sample_rate, callback)?;
        log::info!("recording at {sample_rate} Hz");

        *active = Some(ActiveCapture {
            stream,
            queue: rx,
            sample_rate,
        });
        Ok(sample_rate)
    }

    /// Stop the stream and synchronously drain the queue.
    ///
    /// Returns the concatenated samples with their sample rate, or `None`
    /// when there was no open session or no audio arrived (in which case the
    /// caller emits no transcript).
    pub fn stop(&self) -> Option<(Vec<f32>, u32)> {
        let mut guard = self.active.lock().unwrap();
        let active = guard.take()?;
        // Close under the same lock that start holds, so a concurrent start
        // observes either the old stream fully released or nothing at all.
        active.stream.close();

        let mut samples = Vec::new();
        while let Ok(block) = active.queue.try_recv() {
            samples.extend_from_slice(&block);
        }
        drop(guard);

        if samples.is_empty() {
            log::debug!("capture stopped with an empty queue");
            return None;
        }

        log::debug!(
            "captured {:.2}s of audio at {} Hz",
            samples.len() as f32 / active.sample_rate as f32,
            active.sample_rate
        );
        Some((samples, active.sample_rate))
    }

    /// Whether a session is currently open.
    pub fn is_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }
}

// ---------------------------------------------------------------------------
// CpalInput
// ---------------------------------------------------------------------------

/// Production [`InputSource`] backed by `cpal`.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream is built
/// and owned by a dedicated `audio-stream` thread; the returned handle talks
/// to that thread over a channel and is freely `Send`.
pub struct CpalInput;

struct CpalStream {
    stop_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl InputStream for CpalStream {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl InputSource for CpalInput {
    fn default_sample_rate(&self) -> Option<u32> {
        let device = cpal::default_host().default_input_device()?;
        match device.default_input_config() {
            Ok(config) => Some(config.sample_rate().0),
            Err(e) => {
                log::warn!("default input config query failed: {e}");
                None
            }
        }
    }

    fn open_stream(
        &self,
        sample_rate: u32,
        mut callback: BlockCallback,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("audio-stream".into())
            .spawn(move || {
                let built = (|| -> Result<cpal::Stream, CaptureError> {
                    let device = cpal::default_host()
                        .default_input_device()
                        .ok_or(CaptureError::NoDevice)?;

                    let config = cpal::StreamConfig {
                        channels: 1,
                        sample_rate: cpal::SampleRate(sample_rate),
                        buffer_size: cpal::BufferSize::Default,
                    };

                    let stream = device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data),
                        |err: cpal::StreamError| {
                            log::error!("cpal stream error: {err}");
                        },
                        None, // no timeout
                    )?;
                    stream.play()?;
                    Ok(stream)
                })();

                match built {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Park until told to stop; dropping the stream here
                        // releases the device.
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::StreamThread(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| CaptureError::StreamThread("stream thread exited early".into()))??;

        Ok(Box::new(CpalStream {
            stop_tx,
            thread: Some(thread),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
