//! Remote synthesis over HTTP.

use async_trait::async_trait;
use tracing::debug;

use super::{SynthesisBackend, SynthesisRequest};
use crate::error::{Result, VoiceError};

/// POSTs `{ text, voice, rate, pitch }` as JSON and returns the response body.
///
/// Any audio container works as long as the configured `AudioBackend` can
/// decode it; the bundled cpal backend expects WAV.
#[derive(Debug, Clone)]
pub struct HttpSynthesisBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesisBackend {
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if `endpoint` is not an http(s) URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim().to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(VoiceError::Config(format!(
                "synthesis endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("petvoice/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SynthesisBackend for HttpSynthesisBackend {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        debug!(
            voice = request.voice.as_str(),
            chars = request.text.chars().count(),
            "requesting remote synthesis"
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::SynthesisFailed(format!(
                "backend returned {status}: {body}"
            )));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        let err = HttpSynthesisBackend::new("ftp://tts.local/synthesize").unwrap_err();
        assert!(matches!(err, VoiceError::Config(_)));
        assert!(HttpSynthesisBackend::new("").is_err());
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let backend = HttpSynthesisBackend::new("https://tts.local/synthesize")
            .expect("valid endpoint")
            .with_api_key("   ");
        assert!(backend.api_key.is_none());
        assert_eq!(backend.endpoint(), "https://tts.local/synthesize");
    }

    #[test]
    fn request_body_uses_plain_field_names() {
        let request = SynthesisRequest {
            text: "Ciao!".into(),
            voice: "it-IT-ElsaNeural".into(),
            rate: "+0%".into(),
            pitch: "+0Hz".into(),
        };
        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["text"], "Ciao!");
        assert_eq!(json["voice"], "it-IT-ElsaNeural");
        assert_eq!(json["rate"], "+0%");
        assert_eq!(json["pitch"], "+0Hz");
    }
}
