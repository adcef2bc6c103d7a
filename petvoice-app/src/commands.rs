//! Line commands read from stdin.
//!
//! Each line parses into a [`Command`]; [`execute`] applies it to the
//! engines held by [`AppState`].

use anyhow::{anyhow, bail};
use petvoice_core::{audio::list_output_devices, SpeakOptions, StartOptions};
use tracing::info;

use crate::state::AppState;

pub const HELP: &str = "\
commands:
  say <text>            speak now, dropping anything queued
  queue <text>          speak after the current reply
  auto <text>           speak only when autoplay is on
  pause | resume | stop | skip
  volume <0..1>         set and remember the volume
  autoplay              toggle autoplay
  voice <id>            remember a voice (empty clears it)
  listen [continuous] [<lang>]
  done                  stop listening, keep the final result
  cancel                stop listening, drop pending results
  clear                 clear the transcript
  mic                   check microphone access
  devices               list output devices
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    Queue(String),
    Auto(String),
    Pause,
    Resume,
    Stop,
    Skip,
    Volume(f32),
    ToggleAutoPlay,
    Voice(String),
    Listen {
        continuous: bool,
        language: Option<String>,
    },
    Done,
    Cancel,
    Clear,
    Mic,
    Devices,
    Status,
    Help,
    Quit,
}

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "say" => Command::Say(require_text(verb, rest)?),
        "queue" => Command::Queue(require_text(verb, rest)?),
        "auto" => Command::Auto(require_text(verb, rest)?),
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "skip" | "next" => Command::Skip,
        "volume" | "vol" => {
            let volume = rest
                .parse::<f32>()
                .map_err(|_| anyhow!("volume expects a number between 0 and 1, got {rest:?}"))?;
            Command::Volume(volume)
        }
        "autoplay" => Command::ToggleAutoPlay,
        "voice" => Command::Voice(rest.to_string()),
        "listen" => {
            let mut continuous = false;
            let mut language = None;
            for arg in rest.split_whitespace() {
                if arg.eq_ignore_ascii_case("continuous") {
                    continuous = true;
                } else if language.is_none() {
                    language = Some(arg.to_string());
                } else {
                    bail!("unexpected argument {arg:?} for listen");
                }
            }
            Command::Listen {
                continuous,
                language,
            }
        }
        "done" => Command::Done,
        "cancel" => Command::Cancel,
        "clear" => Command::Clear,
        "mic" => Command::Mic,
        "devices" => Command::Devices,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command {other:?}; type `help`"),
    };
    Ok(Some(command))
}

fn require_text(verb: &str, rest: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        bail!("{verb} needs some text");
    }
    Ok(rest.to_string())
}

pub async fn execute(state: &AppState, command: Command) -> anyhow::Result<Flow> {
    let synthesis = &state.synthesis;
    let recognition = &state.recognition;
    match command {
        Command::Say(text) => {
            synthesis.speak(&text, SpeakOptions::default());
        }
        Command::Queue(text) => {
            synthesis.enqueue(&text);
        }
        Command::Auto(text) => {
            if synthesis.speak_if_auto_play(&text).is_none() {
                println!("autoplay is off");
            }
        }
        Command::Pause => synthesis.pause(),
        Command::Resume => synthesis.resume(),
        Command::Stop => synthesis.stop(),
        Command::Skip => {
            synthesis.skip();
        }
        Command::Volume(volume) => synthesis.set_volume(volume),
        Command::ToggleAutoPlay => {
            let enabled = synthesis.toggle_auto_play();
            println!("autoplay {}", if enabled { "on" } else { "off" });
        }
        Command::Voice(voice) => synthesis.select_voice(&voice),
        Command::Listen {
            continuous,
            language,
        } => {
            if !recognition.is_supported() {
                println!("speech recognition is not available on this host");
                return Ok(Flow::Continue);
            }
            let mut options = if continuous {
                StartOptions::continuous()
            } else {
                StartOptions::single_shot()
            };
            if let Some(language) = language {
                options = options.with_language(language);
            }
            recognition.start(options);
        }
        Command::Done => recognition.stop(),
        Command::Cancel => recognition.abort(),
        Command::Clear => recognition.clear_transcript(),
        Command::Mic => {
            let granted = recognition.request_permission().await;
            println!(
                "microphone {}",
                if granted { "available" } else { "unavailable" }
            );
        }
        Command::Devices => {
            for device in list_output_devices() {
                let marker = if device.is_default { "*" } else { " " };
                println!("{marker} {}", device.name);
            }
        }
        Command::Status => {}
        Command::Help => println!("{HELP}"),
        Command::Quit => {
            info!("quit requested");
            synthesis.stop();
            recognition.abort();
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}
