//! Process entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (stderr; stdout is reserved for host events).
//! 2. Parse the host-supplied flags into [`Config`].
//! 3. Load the recognizer model (fail-soft: a missing model degrades to
//!    empty transcripts, it does not prevent startup).
//! 4. Emit `engine_ready`.
//! 5. Spawn the [`Engine`] run loop on a tokio runtime.
//! 6. Start the hotkey listener thread (and, in polling mode, the poll
//!    watcher).  Hook subscription failure is the one fatal error.
//! 7. Block forever on the engine task.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use pushtalk::asr::{NullRecognizer, Recognizer, WhisperRecognizer, MODEL_FILE, MODEL_SAMPLE_RATE};
use pushtalk::audio::{CaptureSession, CpalInput, LevelState};
use pushtalk::deliver::{EnigoInjector, SystemClipboard, TranscriptDelivery};
use pushtalk::events::{EventSink, HostEvent, StdoutSink};
use pushtalk::hotkey::poll::MachineProbe;
use pushtalk::hotkey::{HotkeyCombo, HotkeyListener, HotkeyStateMachine, PollWatcher, Transition};
use pushtalk::{Config, Engine};

fn main() -> anyhow::Result<()> {
    // Logging goes to stderr so it never interleaves with host events.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_args(std::env::args().skip(1)).context("parsing arguments")?;
    log::info!(
        "pushtalk starting (model dir {}, paste mode {:?}, inject {})",
        config.model_dir.display(),
        config.paste_mode,
        config.type_into_active_app
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    let sink: Arc<dyn EventSink> = Arc::new(StdoutSink::new());

    // Recognizer — degrade to empty transcripts when the model is missing so
    // the hotkey/overlay side keeps working and the host can surface the
    // problem to the user.
    let model_path = config.model_dir.join(MODEL_FILE);
    let recognizer: Arc<dyn Recognizer> = match WhisperRecognizer::load(&model_path) {
        Ok(recognizer) => {
            log::info!("recognizer model loaded: {}", model_path.display());
            Arc::new(recognizer)
        }
        Err(e) => {
            log::warn!("could not load recognizer model: {e}; transcripts will be empty");
            Arc::new(NullRecognizer)
        }
    };

    sink.emit(HostEvent::EngineReady);

    let level = Arc::new(LevelState::new());
    let capture = CaptureSession::new(Box::new(CpalInput), Arc::clone(&level), MODEL_SAMPLE_RATE);
    let delivery = Arc::new(TranscriptDelivery::new(
        Box::new(SystemClipboard),
        Box::new(EnigoInjector),
        config.paste_mode,
    ));

    let (transition_tx, transition_rx) = mpsc::channel::<Transition>(16);

    let engine = Engine::new(
        capture,
        level,
        recognizer,
        delivery,
        sink,
        config.type_into_active_app,
    );
    let engine_task = rt.spawn(engine.run(transition_rx));

    // Hotkey input: the listener always maintains the pressed-key set; in
    // polling mode the watcher owns the transitions instead.
    let machine = Arc::new(HotkeyStateMachine::new(HotkeyCombo::ctrl_shift()));
    let _watcher = if config.poll_hotkey {
        log::info!("polling-mode hotkey detection enabled");
        Some(PollWatcher::start(
            Box::new(MachineProbe::new(Arc::clone(&machine))),
            Arc::clone(&machine),
            transition_tx.clone(),
        ))
    } else {
        None
    };
    let _listener = HotkeyListener::start(machine, transition_tx, !config.poll_hotkey);

    log::info!("ready — hold Ctrl+Shift to dictate");

    // The transition sender lives in the listener thread for the process
    // lifetime, so this blocks until the process is killed.
    rt.block_on(engine_task).context("engine task failed")?;
    Ok(())
}
