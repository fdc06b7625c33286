//! Speech recognition seam.
//!
//! The engine consumes ASR strictly through the
//! `create_stream / accept_waveform / decode / get_text` contract so the
//! pipeline can be exercised with stub recognizers in tests.
//! [`WhisperRecognizer`] is the production binding over `whisper-rs`.
//!
//! Recognition failures are not part of this pipeline's error surface: a
//! failed decode propagates as an **empty transcript**, which suppresses the
//! transcript event without crashing anything.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::resample;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The fixed sample rate the recognizer expects (16 kHz mono f32).
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Model file name looked up inside the configured model directory.
pub const MODEL_FILE: &str = "ggml-model.bin";

// ---------------------------------------------------------------------------
// AsrError
// ---------------------------------------------------------------------------

/// Errors that can occur while *loading* a recognizer.  (Decode-time
/// failures surface as empty transcripts instead — see the module docs.)
#[derive(Debug, Error)]
pub enum AsrError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("recognizer initialisation failed: {0}")]
    ContextInit(String),
}

// ---------------------------------------------------------------------------
// Recognizer / RecognizerStream traits
// ---------------------------------------------------------------------------

/// One decode pass over one utterance.
pub trait RecognizerStream {
    /// Buffer `samples` captured at `sample_rate`.  Implementations convert
    /// to their native rate if the caller hands them something else.
    fn accept_waveform(&mut self, sample_rate: u32, samples: &[f32]);

    /// Run recognition over everything buffered so far.
    fn decode(&mut self);

    /// The decoded text; empty when nothing was recognized or decoding
    /// failed.
    fn get_text(&self) -> String;
}

/// Object-safe, thread-safe recognizer factory.
///
/// Held behind `Arc<dyn Recognizer>`; each dictation session creates a fresh
/// stream, so no cross-session recognizer state survives.
pub trait Recognizer: Send + Sync {
    fn create_stream(&self) -> Box<dyn RecognizerStream + '_>;
}

// ---------------------------------------------------------------------------
// WhisperRecognizer
// ---------------------------------------------------------------------------

/// Production recognizer wrapping a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created per decode, so the recognizer can be
/// shared across threads without locking.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but the model weights are
// read-only after loading; whisper-rs declares the context Send+Sync.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperRecognizer {}
unsafe impl Sync for WhisperRecognizer {}

impl WhisperRecognizer {
    /// Load the GGML model file from `model_path`.
    ///
    /// # Errors
    ///
    /// [`AsrError::ModelNotFound`] when the file does not exist,
    /// [`AsrError::ContextInit`] when whisper-rs rejects it.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, AsrError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(AsrError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            AsrError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| AsrError::ContextInit(e.to_string()))?;

        Ok(Self { ctx, n_threads: 4 })
    }
}

impl Recognizer for WhisperRecognizer {
    fn create_stream(&self) -> Box<dyn RecognizerStream + '_> {
        Box::new(WhisperStream {
            recognizer: self,
            buffered: Vec::new(),
            text: String::new(),
        })
    }
}

struct WhisperStream<'a> {
    recognizer: &'a WhisperRecognizer,
    buffered: Vec<f32>,
    text: String,
}

impl RecognizerStream for WhisperStream<'_> {
    fn accept_waveform(&mut self, sample_rate: u32, samples: &[f32]) {
        if sample_rate == MODEL_SAMPLE_RATE {
            self.buffered.extend_from_slice(samples);
        } else {
            self.buffered
                .extend(resample(samples, sample_rate, MODEL_SAMPLE_RATE));
        }
    }

    fn decode(&mut self) {
        self.text.clear();
        if self.buffered.is_empty() {
            return;
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(None); // auto-detect
        params.set_n_threads(self.recognizer.n_threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = match self.recognizer.ctx.create_state() {
            Ok(state) => state,
            Err(e) => {
                log::error!("whisper state creation failed: {e}");
                return;
            }
        };

        if let Err(e) = state.full(params, &self.buffered) {
            log::error!("whisper decode failed: {e}");
            return;
        }

        let n_segments = match state.full_n_segments() {
            Ok(n) => n,
            Err(e) => {
                log::error!("whisper segment count failed: {e}");
                return;
            }
        };

        for i in 0..n_segments {
            match state.full_get_segment_text(i) {
                Ok(segment) => self.text.push_str(&segment),
                Err(e) => log::warn!("whisper segment {i} unreadable: {e}"),
            }
        }
        self.text = self.text.trim().to_string();
    }

    fn get_text(&self) -> String {
        self.text.clone()
    }
}

// ---------------------------------------------------------------------------
// NullRecognizer
// ---------------------------------------------------------------------------

/// Fail-soft recognizer used when no model could be loaded: every decode
/// yields an empty transcript, so the rest of the engine (hotkeys, capture,
/// level events) keeps working and the host can tell the user to fix the
/// model path.
pub struct NullRecognizer;

struct NullStream;

impl RecognizerStream for NullStream {
    fn accept_waveform(&mut self, _sample_rate: u32, _samples: &[f32]) {}

    fn decode(&mut self) {
        log::warn!("no recognizer model loaded; transcript will be empty");
    }

    fn get_text(&self) -> String {
        String::new()
    }
}

impl Recognizer for NullRecognizer {
    fn create_stream(&self) -> Box<dyn RecognizerStream + '_> {
        Box::new(NullStream)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Stub recognizer returning a fixed transcript, recording what it was
    /// fed.
    pub struct FixedRecognizer {
        pub response: String,
        pub accepted: Mutex<Vec<(u32, usize)>>,
    }

    impl FixedRecognizer {
        pub fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                accepted: Mutex::new(Vec::new()),
            }
        }
    }

    struct FixedStream<'a> {
        parent: &'a FixedRecognizer,
        decoded: bool,
    }

    impl RecognizerStream for FixedStream<'_> {
        fn accept_waveform(&mut self, sample_rate: u32, samples: &[f32]) {
            self.parent
                .accepted
                .lock()
                .unwrap()
                .push((sample_rate, samples.len()));
        }

        fn decode(&mut self) {
            self.decoded = true;
        }

        fn get_text(&self) -> String {
            if self.decoded {
                self.parent.response.clone()
            } else {
                String::new()
            }
        }
    }

    impl Recognizer for FixedRecognizer {
        fn create_stream(&self) -> Box<dyn RecognizerStream + '_> {
            Box::new(FixedStream {
                parent: self,
                decoded: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FixedRecognizer;
    use super::*;

    #[test]
    fn load_missing_model_reports_not_found() {
        let err = WhisperRecognizer::load("/definitely/not/here/ggml-model.bin").unwrap_err();
        assert!(matches!(err, AsrError::ModelNotFound(_)));
    }

    #[test]
    fn null_recognizer_yields_empty_text() {
        let mut stream = NullRecognizer.create_stream();
        stream.accept_waveform(MODEL_SAMPLE_RATE, &[0.1; 16_000]);
        stream.decode();
        assert!(stream.get_text().is_empty());
    }

    #[test]
    fn fixed_recognizer_follows_the_stream_contract() {
        let rec = FixedRecognizer::new("hello");
        let mut stream = rec.create_stream();
        stream.accept_waveform(MODEL_SAMPLE_RATE, &[0.0; 16_000]);
        assert_eq!(stream.get_text(), "", "text only available after decode");
        stream.decode();
        assert_eq!(stream.get_text(), "hello");
        assert_eq!(*rec.accepted.lock().unwrap(), vec![(16_000, 16_000)]);
    }
}
