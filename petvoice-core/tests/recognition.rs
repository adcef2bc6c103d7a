mod common;

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use common::{final_result, partial, platform_error, settle, FakeMicrophone, FakeRecognition};
use petvoice_core::{
    RecognitionConfig, RecognitionErrorKind, RecognitionEvent, RecognitionMode,
    RecognitionSession, RecognizedSegment, RecognizerEvent, StartOptions,
};

fn session_with(backend: Arc<FakeRecognition>, mic: Arc<FakeMicrophone>) -> RecognitionSession {
    RecognitionSession::new(RecognitionConfig::default(), backend, mic)
}

fn session() -> (RecognitionSession, Arc<FakeRecognition>) {
    let backend = FakeRecognition::new(true);
    (session_with(backend.clone(), FakeMicrophone::granted()), backend)
}

#[tokio::test(start_paused = true)]
async fn italian_single_shot_stops_after_first_final() {
    let (session, backend) = session();

    session.start(StartOptions::single_shot().with_language("it-IT"));
    settle().await;
    assert!(session.is_listening());

    let config = backend.config(0);
    assert_eq!(config.language, "it-IT");
    assert!(config.interim_results);
    assert_eq!(config.max_alternatives, 1);
    assert!(!config.continuous);

    backend.send_latest(partial("ciao com"));
    settle().await;
    assert_eq!(session.interim_transcript(), "ciao com");
    assert!(session.is_listening());

    backend.send_latest(final_result("ciao come stai", 0.92));
    settle().await;
    assert_eq!(session.transcript(), "ciao come stai");
    assert_eq!(session.interim_transcript(), "");
    assert_relative_eq!(session.confidence(), 0.92);
    assert!(!session.is_listening(), "single-shot ends without an explicit stop");
    assert_eq!(backend.commands(0), vec!["stop"]);
    assert_eq!(session.error(), None);
}

#[tokio::test(start_paused = true)]
async fn continuous_mode_accumulates_finals() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    settle().await;
    assert!(backend.config(0).continuous);
    assert_eq!(session.mode(), RecognitionMode::Continuous);

    backend.send_latest(final_result(" buongiorno ", 0.8));
    backend.send_latest(final_result("come va", 0.7));
    settle().await;

    assert_eq!(session.transcript(), "buongiorno come va");
    assert_relative_eq!(session.confidence(), 0.7);
    assert!(session.is_listening());
}

#[tokio::test(start_paused = true)]
async fn only_results_from_result_index_are_new() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    settle().await;

    backend.send_latest(RecognizerEvent::Result {
        result_index: 1,
        results: vec![
            RecognizedSegment {
                is_final: true,
                transcript: "già visto".into(),
                confidence: 0.5,
            },
            RecognizedSegment {
                is_final: true,
                transcript: "nuovo".into(),
                confidence: 0.9,
            },
            RecognizedSegment {
                is_final: false,
                transcript: "e poi".into(),
                confidence: 0.0,
            },
        ],
    });
    settle().await;

    assert_eq!(session.transcript(), "nuovo");
    // A final in the same event clears the interim buffer.
    assert_eq!(session.interim_transcript(), "");
}

#[tokio::test(start_paused = true)]
async fn silence_timeout_stops_after_five_seconds() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());

    tokio::time::sleep(Duration::from_millis(4990)).await;
    assert!(session.is_listening());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!session.is_listening());
    assert_eq!(backend.commands(0), vec!["stop"]);
}

#[tokio::test(start_paused = true)]
async fn every_event_rearms_the_silence_timer() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());

    tokio::time::sleep(Duration::from_millis(3000)).await;
    backend.send_latest(partial("allora"));
    settle().await;

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(session.is_listening(), "timer should restart on the partial");

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(!session.is_listening());
}

#[tokio::test(start_paused = true)]
async fn timer_of_superseded_session_does_nothing() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    tokio::time::sleep(Duration::from_millis(3000)).await;

    session.start(StartOptions::continuous());
    assert_eq!(backend.commands(0), vec!["abort"]);

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(session.is_listening(), "first session's timer must not stop the second");
    assert!(backend.commands(1).is_empty());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(!session.is_listening());
    assert_eq!(backend.commands(1), vec!["stop"]);
}

#[tokio::test(start_paused = true)]
async fn restart_resets_buffers_and_ignores_old_recognizer() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    backend.send_latest(final_result("vecchio", 0.6));
    settle().await;
    assert_eq!(session.transcript(), "vecchio");

    session.start(StartOptions::continuous());
    assert_eq!(session.transcript(), "");
    assert_relative_eq!(session.confidence(), 0.0);

    backend.send(0, final_result("fantasma", 0.9));
    settle().await;
    assert_eq!(session.transcript(), "");
    assert_eq!(backend.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn graceful_stop_accepts_final_flush() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    backend.send_latest(partial("quasi fin"));
    settle().await;

    session.stop();
    session.stop();
    assert!(!session.is_listening());
    assert_eq!(backend.commands(0), vec!["stop"]);

    backend.send_latest(final_result("quasi finito", 0.85));
    backend.send_latest(RecognizerEvent::End);
    settle().await;

    assert_eq!(session.transcript(), "quasi finito");
    assert_eq!(session.interim_transcript(), "");
    assert!(!session.is_listening());
}

#[tokio::test(start_paused = true)]
async fn abort_discards_interim_and_late_events() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    backend.send_latest(final_result("tenuto", 0.9));
    backend.send_latest(partial("scarta"));
    settle().await;

    session.abort();
    session.abort();
    assert!(!session.is_listening());
    assert_eq!(session.interim_transcript(), "");
    assert_eq!(session.transcript(), "tenuto");
    assert_eq!(backend.commands(0), vec!["abort"]);

    backend.send_latest(final_result("troppo tardi", 0.9));
    settle().await;
    assert_eq!(session.transcript(), "tenuto");
}

#[tokio::test(start_paused = true)]
async fn no_speech_ends_quietly() {
    let (session, backend) = session();
    let mut events = session.subscribe();
    session.start(StartOptions::single_shot());
    settle().await;

    backend.send_latest(platform_error("no-speech"));
    settle().await;

    assert!(!session.is_listening());
    assert_eq!(session.error(), None);
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, RecognitionEvent::Error { .. }),
            "no-speech must not surface an error"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn platform_errors_are_mapped_and_end_the_session() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    settle().await;

    backend.send_latest(platform_error("network"));
    settle().await;
    assert!(!session.is_listening());
    assert_eq!(session.error(), Some(RecognitionErrorKind::Network));

    session.start(StartOptions::continuous());
    assert_eq!(session.error(), None, "start resets the error");
    backend.send_latest(platform_error("not-allowed"));
    settle().await;
    assert_eq!(session.error(), Some(RecognitionErrorKind::PermissionDenied));
}

#[tokio::test(start_paused = true)]
async fn start_failure_sets_error_and_stays_idle() {
    let (session, backend) = session();
    backend.set_fail_start(true);

    session.start(StartOptions::single_shot());
    assert!(!session.is_listening());
    assert!(matches!(session.error(), Some(RecognitionErrorKind::Unknown(_))));
}

#[tokio::test(start_paused = true)]
async fn unsupported_platform_makes_start_a_no_op() {
    let backend = FakeRecognition::new(false);
    let session = session_with(backend.clone(), FakeMicrophone::granted());

    assert!(!session.is_supported());
    session.start(StartOptions::single_shot());
    session.stop();
    session.abort();

    assert!(!session.is_listening());
    assert_eq!(session.error(), None);
    assert_eq!(backend.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn language_resolution_order() {
    let (session, backend) = session();
    assert_eq!(session.language(), "it-IT");

    session.start(StartOptions::single_shot());
    session.set_language("en-US");
    assert_eq!(backend.config(0).language, "it-IT", "running session keeps its language");

    session.start(StartOptions::single_shot());
    session.start(StartOptions::single_shot().with_language("fr-FR"));

    assert_eq!(backend.config(1).language, "en-US");
    assert_eq!(backend.config(2).language, "fr-FR");
    assert_eq!(session.language(), "en-US");
}

#[tokio::test(start_paused = true)]
async fn clear_transcript_keeps_listening() {
    let (session, backend) = session();
    session.start(StartOptions::continuous());
    backend.send_latest(final_result("qualcosa", 0.9));
    backend.send_latest(partial("altro"));
    settle().await;

    session.clear_transcript();
    assert_eq!(session.transcript(), "");
    assert_eq!(session.interim_transcript(), "");
    assert!(session.is_listening());
}

#[tokio::test(start_paused = true)]
async fn listening_changes_are_broadcast() {
    let (session, backend) = session();
    let mut events = session.subscribe();

    session.start(StartOptions::single_shot());
    backend.send_latest(final_result("fatto", 1.0));
    settle().await;

    let listening: Vec<bool> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            RecognitionEvent::ListeningChanged { listening } => Some(listening),
            _ => None,
        })
        .collect();
    assert_eq!(listening, vec![true, false]);
}

#[tokio::test]
async fn permission_probe_reports_denial() {
    let backend = FakeRecognition::new(true);

    let granted = session_with(backend.clone(), FakeMicrophone::granted());
    assert!(granted.request_permission().await);
    assert_eq!(granted.error(), None);

    let denied = session_with(backend.clone(), FakeMicrophone::denied());
    assert!(!denied.request_permission().await);
    assert_eq!(denied.error(), Some(RecognitionErrorKind::PermissionDenied));
    assert!(!denied.is_listening());
    assert_eq!(backend.starts(), 0, "probing must not start recognition");
}
