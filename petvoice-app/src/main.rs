//! Petvoice terminal front end.
//!
//! Reads one command per line from stdin, drives the speech engines and
//! prints a JSON status snapshot after each command. Engine events are
//! forwarded to the log.

mod commands;
mod settings;
mod state;

use std::time::Duration;

use petvoice_core::{RecognitionEvent, SynthesisEvent};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use commands::{execute, parse_command, Flow};
use settings::{default_data_dir, load_settings, save_settings, settings_path};
use state::AppState;

/// Time given to a playing reply to stop cleanly on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("petvoice=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Petvoice starting");

    // ── Settings ──────────────────────────────────────────────────────────
    let data_dir = default_data_dir();
    let path = settings_path(&data_dir);
    let mut app_settings = load_settings(&path);
    app_settings.apply_env_overrides(|key| std::env::var(key).ok());
    if !path.exists() {
        if let Err(e) = save_settings(&path, &app_settings) {
            warn!(path = %path.display(), "could not write default settings: {e}");
        }
    }
    info!(
        settings_path = %path.display(),
        language = %app_settings.language,
        remote = app_settings.synthesis_url.is_some(),
        espeak = %app_settings.espeak_binary,
        "runtime settings loaded"
    );

    // ── Engines ───────────────────────────────────────────────────────────
    let state = AppState::build(app_settings, &data_dir)?;
    info!(data_dir = %state.data_dir.display(), "engines ready");
    forward_events("synthesis", state.synthesis.subscribe(), log_synthesis_event);
    forward_events(
        "recognition",
        state.recognition.subscribe(),
        log_recognition_event,
    );

    // ── Command loop ──────────────────────────────────────────────────────
    println!("{}", commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };
        match execute(&state, command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("error: {e:#}"),
        }
        print_json(&state.status_snapshot());
    }

    state.synthesis.stop();
    state.recognition.abort();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!("Petvoice stopped");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("status serialization failed: {e}"),
    }
}

/// Drain a broadcast receiver into `log` until the sender goes away.
fn forward_events<E, F>(name: &'static str, mut rx: broadcast::Receiver<E>, log: F)
where
    E: Clone + Send + 'static,
    F: Fn(&E) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(stream = name, skipped, "event forwarder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(stream = name, "event forwarder exited");
    });
}

fn log_synthesis_event(event: &SynthesisEvent) {
    match event {
        SynthesisEvent::Error { message } => warn!("speech error: {message}"),
        SynthesisEvent::Advisory { message } => info!("speech notice: {message}"),
        other => debug!(event = ?other, "synthesis event"),
    }
}

fn log_recognition_event(event: &RecognitionEvent) {
    match event {
        RecognitionEvent::Transcript {
            transcript,
            interim,
        } => {
            if interim.is_empty() {
                info!("heard: {transcript}");
            } else {
                debug!("hearing: {transcript} [{interim}]");
            }
        }
        RecognitionEvent::Error { code, message } => {
            warn!(code = %code, "recognition error: {message}")
        }
        other => debug!(event = ?other, "recognition event"),
    }
}
