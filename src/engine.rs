//! Engine orchestrator — wires hotkey transitions to capture, recognition
//! and delivery.
//!
//! # Pipeline flow
//!
//! ```text
//! Transition::Begin
//!   └─▶ capture.start → level emitter up → dictation_start + overlay{hover:true}
//!
//! Transition::End
//!   └─▶ capture.stop → level emitter down (final 0.0) → dictation_stop
//!         └─▶ drain → resample → spawn_blocking(decode)
//!               ├─ text       → transcript event → spawn_blocking(deliver)
//!               └─ empty text → nothing (no event, no delivery)
//!         └─▶ overlay{hover:false}
//! ```
//!
//! Blocking work (whisper inference, clipboard I/O) goes through
//! `tokio::task::spawn_blocking`.  The loop awaits it before taking the next
//! transition — dictation is inherently a blocking user gesture, the user
//! has already released the key.
//!
//! The begin-side events are emitted **regardless** of whether the audio
//! stream actually opened: the host-side "active" signal must stay symmetric
//! with the physical gesture, and a device error is fail-soft.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::asr::{Recognizer, MODEL_SAMPLE_RATE};
use crate::audio::{resample, CaptureSession, LevelEmitter, LevelState};
use crate::deliver::TranscriptDelivery;
use crate::events::{EventSink, HostEvent};
use crate::hotkey::Transition;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns every component of the dictation pipeline and the locks between
/// them.  Create with [`Engine::new`], then spawn [`run`](Self::run) on the
/// tokio runtime.
pub struct Engine {
    capture: CaptureSession,
    level: Arc<LevelState>,
    recognizer: Arc<dyn Recognizer>,
    delivery: Arc<TranscriptDelivery>,
    sink: Arc<dyn EventSink>,
    /// Whether transcripts are injected into the focused app (host config);
    /// the transcript *event* is emitted either way.
    deliver_transcripts: bool,
    emitter: Option<LevelEmitter>,
}

impl Engine {
    pub fn new(
        capture: CaptureSession,
        level: Arc<LevelState>,
        recognizer: Arc<dyn Recognizer>,
        delivery: Arc<TranscriptDelivery>,
        sink: Arc<dyn EventSink>,
        deliver_transcripts: bool,
    ) -> Self {
        Self {
            capture,
            level,
            recognizer,
            delivery,
            sink,
            deliver_transcripts,
            emitter: None,
        }
    }

    /// Run until the transition channel closes, then tear down any open
    /// session so shutdown never leaves a live audio stream behind.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Transition>) {
        while let Some(transition) = rx.recv().await {
            match transition {
                Transition::Begin => self.begin_dictation(),
                Transition::End => self.end_dictation().await,
            }
        }

        log::info!("engine: transition channel closed, shutting down");
        if let Some(emitter) = self.emitter.take() {
            emitter.stop();
        }
        let _ = self.capture.stop();
    }

    // -----------------------------------------------------------------------
    // Transition handlers
    // -----------------------------------------------------------------------

    fn begin_dictation(&mut self) {
        log::debug!("engine: begin dictation");

        match self.capture.start() {
            Ok(_rate) => {
                self.emitter = Some(LevelEmitter::start(
                    Arc::clone(&self.level),
                    Arc::clone(&self.sink),
                ));
            }
            Err(e) => {
                // Fail-soft: the gesture already happened, so the host still
                // sees the active transition below.
                log::warn!("unable to start recording: {e}");
            }
        }

        self.sink.emit(HostEvent::DictationStart);
        self.sink.emit(HostEvent::Overlay { hover: true });
    }

    async fn end_dictation(&mut self) {
        log::debug!("engine: end dictation");

        let drained = self.capture.stop();
        if let Some(emitter) = self.emitter.take() {
            emitter.stop();
        }

        self.sink.emit(HostEvent::DictationStop);

        if let Some((samples, sample_rate)) = drained {
            self.process(samples, sample_rate).await;
        }

        self.sink.emit(HostEvent::Overlay { hover: false });
    }

    // -----------------------------------------------------------------------
    // Processing: resample → decode → deliver
    // -----------------------------------------------------------------------

    async fn process(&self, samples: Vec<f32>, sample_rate: u32) {
        let audio = resample(&samples, sample_rate, MODEL_SAMPLE_RATE);
        if sample_rate != MODEL_SAMPLE_RATE {
            log::debug!("resampled {sample_rate} Hz → {MODEL_SAMPLE_RATE} Hz");
        }

        let recognizer = Arc::clone(&self.recognizer);
        let decoded = tokio::task::spawn_blocking(move || {
            let mut stream = recognizer.create_stream();
            stream.accept_waveform(MODEL_SAMPLE_RATE, &audio);
            stream.decode();
            stream.get_text()
        })
        .await;

        let text = match decoded {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::error!("decode task failed: {e}");
                return;
            }
        };

        if text.is_empty() {
            log::debug!("empty transcript; nothing to deliver");
            return;
        }

        self.sink.emit(HostEvent::Transcript { text: text.clone() });

        if self.deliver_transcripts {
            let delivery = Arc::clone(&self.delivery);
            if let Err(e) = tokio::task::spawn_blocking(move || delivery.deliver(&text)).await {
                log::warn!("delivery task panicked: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::test_support::FixedRecognizer;
    use crate::audio::capture::test_support::FakeInput;
    use crate::deliver::test_support::{fast_timing, FakeClipboard, FakeInjector};
    use crate::deliver::{Clipboard, DeliverError, PasteMode, TextInjector};
    use crate::events::CollectingSink;
    use crate::hotkey::Transition;

    // -----------------------------------------------------------------------
    // Wiring helpers
    // -----------------------------------------------------------------------

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

    struct Harness {
        sink: Arc<CollectingSink>,
        injector: Arc<FakeInjector>,
        engine: Engine,
    }

    fn harness(source: FakeInput, transcript: &str) -> Harness {
        let sink = Arc::new(CollectingSink::new());
        let injector = Arc::new(FakeInjector::new());
        let clipboard = Arc::new(FakeClipboard::with_content(Some("prior")));
        let level = Arc::new(LevelState::new());

        let engine = Engine::new(
            CaptureSession::new(Box::new(source), Arc::clone(&level), MODEL_SAMPLE_RATE),
            level,
            Arc::new(FixedRecognizer::new(transcript)),
            Arc::new(TranscriptDelivery::with_timing(
                Box::new(CbRef(clipboard)),
                Box::new(InjRef(Arc::clone(&injector))),
                PasteMode::Auto,
                fast_timing(),
            )),
            Arc::clone(&sink) as Arc<dyn EventSink>,
            true,
        );

        Harness {
            sink,
            injector,
            engine,
        }
    }

    async fn run_cycle(engine: Engine) {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Transition::Begin).await.unwrap();
        tx.send(Transition::End).await.unwrap();
        drop(tx);
        engine.run(rx).await;
    }

    fn without_levels(events: &[HostEvent]) -> Vec<HostEvent> {
        events
            .iter()
            .filter(|e| !matches!(e, HostEvent::OverlayLevel { .. }))
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Full cycle: 1 s of 44.1 kHz sine → stub recognizer "hello" →
    /// one transcript event and one delivery attempt.
    #[tokio::test]
    async fn full_cycle_emits_transcript_and_delivers_once() {
        let h = harness(FakeInput::sine_440_one_second(), "hello");
        let sink = Arc::clone(&h.sink);
        let injector = Arc::clone(&h.injector);

        run_cycle(h.engine).await;

        let events = without_levels(&sink.events());
        assert_eq!(
            events,
            vec![
                HostEvent::DictationStart,
                HostEvent::Overlay { hover: true },
                HostEvent::DictationStop,
                HostEvent::Transcript {
                    text: "hello".into()
                },
                HostEvent::Overlay { hover: false },
            ]
        );

        // Exactly one delivery attempt (clipboard path succeeded).
        assert_eq!(injector.paste_count(), 1);
        assert!(injector.typed().is_empty());
    }

    /// The stub recognizer must have been fed exactly 16 000 samples at the
    /// model rate (1 s @ 44.1 kHz resampled).
    #[tokio::test]
    async fn recognizer_receives_resampled_model_rate_audio() {
        let recognizer = Arc::new(FixedRecognizer::new("hello"));
        let level = Arc::new(LevelState::new());
        let sink = Arc::new(CollectingSink::new());
        let injector = Arc::new(FakeInjector::new());
        let clipboard = Arc::new(FakeClipboard::with_content(None));

        let engine = Engine::new(
            CaptureSession::new(
                Box::new(FakeInput::sine_440_one_second()),
                Arc::clone(&level),
                MODEL_SAMPLE_RATE,
            ),
            level,
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::new(TranscriptDelivery::with_timing(
                Box::new(CbRef(clipboard)),
                Box::new(InjRef(injector)),
                PasteMode::Auto,
                fast_timing(),
            )),
            sink,
            true,
        );

        run_cycle(engine).await;

        assert_eq!(
            *recognizer.accepted.lock().unwrap(),
            vec![(MODEL_SAMPLE_RATE, 16_000)]
        );
    }

    /// Empty capture queue → no transcript event, no delivery.
    #[tokio::test]
    async fn silent_release_emits_no_transcript() {
        let h = harness(FakeInput::with_blocks(44_100, vec![]), "hello");
        let sink = Arc::clone(&h.sink);
        let injector = Arc::clone(&h.injector);

        run_cycle(h.engine).await;

        let events = without_levels(&sink.events());
        assert_eq!(
            events,
            vec![
                HostEvent::DictationStart,
                HostEvent::Overlay { hover: true },
                HostEvent::DictationStop,
                HostEvent::Overlay { hover: false },
            ]
        );
        assert_eq!(injector.paste_count(), 0);
        assert!(injector.typed().is_empty());
    }

    /// Whitespace-only recognizer output is suppressed like an empty one.
    #[tokio::test]
    async fn whitespace_transcript_is_suppressed() {
        let h = harness(
            FakeInput::with_blocks(16_000, vec![vec![0.1; 16_000]]),
            "   ",
        );
        let sink = Arc::clone(&h.sink);
        let injector = Arc::clone(&h.injector);

        run_cycle(h.engine).await;

        assert!(!without_levels(&sink.events())
            .iter()
            .any(|e| matches!(e, HostEvent::Transcript { .. })));
        assert_eq!(injector.paste_count(), 0);
    }

    /// A failed capture start must still produce symmetric host events.
    #[tokio::test]
    async fn failed_capture_start_keeps_overlay_symmetric() {
        let source = FakeInput {
            sample_rate: Some(44_100),
            blocks: std::sync::Mutex::new(vec![]),
            fail_open: true,
        };
        let h = harness(source, "hello");
        let sink = Arc::clone(&h.sink);

        run_cycle(h.engine).await;

        let events = without_levels(&sink.events());
        assert_eq!(
            events,
            vec![
                HostEvent::DictationStart,
                HostEvent::Overlay { hover: true },
                HostEvent::DictationStop,
                HostEvent::Overlay { hover: false },
            ]
        );
    }

    /// With injection disabled, the transcript event still flows but no
    /// delivery is attempted.
    #[tokio::test]
    async fn delivery_disabled_still_emits_transcript() {
        let sink = Arc::new(CollectingSink::new());
        let injector = Arc::new(FakeInjector::new());
        let clipboard = Arc::new(FakeClipboard::with_content(None));
        let level = Arc::new(LevelState::new());

        let engine = Engine::new(
            CaptureSession::new(
                Box::new(FakeInput::with_blocks(16_000, vec![vec![0.2; 8_000]])),
                Arc::clone(&level),
                MODEL_SAMPLE_RATE,
            ),
            level,
            Arc::new(FixedRecognizer::new("hands off")),
            Arc::new(TranscriptDelivery::with_timing(
                Box::new(CbRef(Arc::clone(&clipboard))),
                Box::new(InjRef(Arc::clone(&injector))),
                PasteMode::Auto,
                fast_timing(),
            )),
            Arc::clone(&sink) as Arc<dyn EventSink>,
            false, // do not inject
        );

        run_cycle(engine).await;

        assert!(without_levels(&sink.events()).contains(&HostEvent::Transcript {
            text: "hands off".into()
        }));
        assert_eq!(injector.paste_count(), 0);
        assert!(injector.typed().is_empty());
        assert!(clipboard.writes.lock().unwrap().is_empty());
    }

    /// Two consecutive cycles each produce their own transcript — no state
    /// bleeds across sessions.
    #[tokio::test]
    async fn consecutive_cycles_are_independent() {
        let h = harness(
            FakeInput::with_blocks(16_000, vec![vec![0.2; 16_000]]),
            "once",
        );
        let sink = Arc::clone(&h.sink);

        let (tx, rx) = mpsc::channel(8);
        for _ in 0..2 {
            tx.send(Transition::Begin).await.unwrap();
            tx.send(Transition::End).await.unwrap();
        }
        drop(tx);
        h.engine.run(rx).await;

        let transcripts: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, HostEvent::Transcript { .. }))
            .collect();
        // The fake source only has blocks for the first cycle; the second
        // drains an empty queue and must stay silent.
        assert_eq!(
            transcripts,
            vec![HostEvent::Transcript {
                text: "once".into()
            }]
        );

        let stops = sink
            .events()
            .iter()
            .filter(|e| matches!(e, HostEvent::DictationStop))
            .count();
        assert_eq!(stops, 2);
    }

    /// While recording, level events flow; the final one is always 0.0.
    #[tokio::test]
    async fn level_events_flow_and_reset() {
        let h = harness(
            FakeInput::with_blocks(16_000, vec![vec![0.5; 16_000]]),
            "hi",
        );
        let sink = Arc::clone(&h.sink);

        let (tx, rx) = mpsc::channel(4);
        let drive = async move {
            tx.send(Transition::Begin).await.unwrap();
            // Give the emitter a few ticks.
            tokio::time::sleep(std::time::Duration::from_millis(120)).await;
            tx.send(Transition::End).await.unwrap();
            drop(tx);
        };
        tokio::join!(h.engine.run(rx), drive);

        let levels: Vec<f32> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::OverlayLevel { level } => Some(level),
                _ => None,
            })
            .collect();

        assert!(levels.len() >= 2, "expected level ticks: {levels:?}");
        assert!(levels.iter().all(|l| (0.0..=1.0).contains(l)));
        assert_eq!(*levels.last().unwrap(), 0.0);
    }
}
