//! Platform recognizer error codes and their user-facing categories.

use thiserror::Error;

use crate::error::VoiceError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionErrorKind {
    #[error("microphone access was denied")]
    PermissionDenied,

    /// Advisory only: the session ends without surfacing an error.
    #[error("no speech was detected")]
    NoSpeech,

    #[error("no microphone is available")]
    AudioCapture,

    #[error("network error during speech recognition")]
    Network,

    #[error("speech recognition was aborted")]
    Aborted,

    #[error("speech recognition service is unavailable")]
    ServiceUnavailable,

    #[error("speech recognition failed: {0}")]
    Unknown(String),
}

impl RecognitionErrorKind {
    /// Map a platform error code. Unrecognised codes keep their text.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "not-allowed" | "permission-denied" => Self::PermissionDenied,
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            "service-not-allowed" | "service-unavailable" => Self::ServiceUnavailable,
            other => {
                let detail = if message.trim().is_empty() { other } else { message.trim() };
                Self::Unknown(detail.to_string())
            }
        }
    }

    /// Stable identifier, as carried by `RecognitionEvent::Error`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::NoSpeech => "no-speech",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::Aborted => "aborted",
            Self::ServiceUnavailable => "service-unavailable",
            Self::Unknown(_) => "unknown",
        }
    }

    /// `false` for outcomes that end a session quietly.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::NoSpeech)
    }
}

impl From<&VoiceError> for RecognitionErrorKind {
    fn from(err: &VoiceError) -> Self {
        match err {
            VoiceError::PermissionDenied(_) => Self::PermissionDenied,
            VoiceError::NoDefaultInputDevice
            | VoiceError::AudioDevice(_)
            | VoiceError::AudioStream(_) => Self::AudioCapture,
            VoiceError::Unavailable(_) => Self::ServiceUnavailable,
            VoiceError::Http(_) => Self::Network,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_platform_codes() {
        let cases = [
            ("not-allowed", RecognitionErrorKind::PermissionDenied),
            ("permission-denied", RecognitionErrorKind::PermissionDenied),
            ("no-speech", RecognitionErrorKind::NoSpeech),
            ("audio-capture", RecognitionErrorKind::AudioCapture),
            ("network", RecognitionErrorKind::Network),
            ("aborted", RecognitionErrorKind::Aborted),
            ("service-not-allowed", RecognitionErrorKind::ServiceUnavailable),
            ("service-unavailable", RecognitionErrorKind::ServiceUnavailable),
        ];
        for (code, expected) in cases {
            assert_eq!(RecognitionErrorKind::from_code(code, ""), expected, "code {code}");
        }
    }

    #[test]
    fn unknown_code_keeps_detail() {
        let kind = RecognitionErrorKind::from_code("bad-grammar", "grammar rejected");
        assert_eq!(kind, RecognitionErrorKind::Unknown("grammar rejected".into()));
        assert_eq!(kind.code(), "unknown");
        assert_eq!(kind.to_string(), "speech recognition failed: grammar rejected");
    }

    #[test]
    fn only_no_speech_is_silent() {
        assert!(!RecognitionErrorKind::NoSpeech.is_reportable());
        assert!(RecognitionErrorKind::Network.is_reportable());
        assert!(RecognitionErrorKind::Aborted.is_reportable());
    }

    #[test]
    fn engine_errors_map_to_categories() {
        let denied = VoiceError::PermissionDenied("blocked by OS".into());
        assert_eq!(RecognitionErrorKind::from(&denied), RecognitionErrorKind::PermissionDenied);
        assert_eq!(
            RecognitionErrorKind::from(&VoiceError::NoDefaultInputDevice),
            RecognitionErrorKind::AudioCapture
        );
    }
}
