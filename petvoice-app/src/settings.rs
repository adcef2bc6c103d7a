//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use petvoice_core::{RecognitionConfig, SynthesisConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Remote synthesis endpoint. `None` means speak with the local voice only.
    pub synthesis_url: Option<String>,
    pub synthesis_api_key: Option<String>,
    pub language: String,
    pub speech_rate: String,
    pub speech_pitch: String,
    pub request_timeout_secs: u64,
    pub cache_capacity: usize,
    pub silence_timeout_ms: u64,
    pub preferred_output_device: Option<String>,
    pub preferred_input_device: Option<String>,
    pub espeak_binary: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            synthesis_url: None,
            synthesis_api_key: None,
            language: "it-IT".into(),
            speech_rate: "+0%".into(),
            speech_pitch: "+0Hz".into(),
            request_timeout_secs: 15,
            cache_capacity: 20,
            silence_timeout_ms: 5000,
            preferred_output_device: None,
            preferred_input_device: None,
            espeak_binary: "espeak-ng".into(),
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.synthesis_url = trimmed(&self.synthesis_url);
        self.synthesis_api_key = trimmed(&self.synthesis_api_key);
        self.preferred_output_device = trimmed(&self.preferred_output_device);
        self.preferred_input_device = trimmed(&self.preferred_input_device);
        self.language = normalize_language(&self.language);
        self.speech_rate = normalize_offset(&self.speech_rate, "%", "+0%");
        self.speech_pitch = normalize_offset(&self.speech_pitch, "Hz", "+0Hz");
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 120);
        self.cache_capacity = self.cache_capacity.clamp(1, 500);
        self.silence_timeout_ms = self.silence_timeout_ms.clamp(1000, 60_000);
        let binary = self.espeak_binary.trim();
        self.espeak_binary = if binary.is_empty() {
            "espeak-ng".into()
        } else {
            binary.into()
        };
    }

    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            language: self.language.clone(),
            rate: self.speech_rate.clone(),
            pitch: self.speech_pitch.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            cache_capacity: self.cache_capacity,
            ..SynthesisConfig::default()
        }
    }

    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            language: self.language.clone(),
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
        }
    }

    /// Environment variables win over the file. `lookup` is `std::env::var`
    /// in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PETVOICE_SYNTH_URL") {
            self.synthesis_url = Some(url);
        }
        if let Some(key) = lookup("PETVOICE_SYNTH_API_KEY") {
            self.synthesis_api_key = Some(key);
        }
        if let Some(language) = lookup("PETVOICE_LANGUAGE") {
            self.language = language;
        }
        if let Some(binary) = lookup("PETVOICE_ESPEAK") {
            self.espeak_binary = binary;
        }
        self.normalize();
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `it`, `it_it` or `IT-it` and returns `it-IT`.
pub fn normalize_language(raw: &str) -> String {
    let cleaned = raw.trim().replace('_', "-");
    let mut parts = cleaned.split('-').filter(|p| !p.is_empty());
    let Some(primary) = parts.next() else {
        return "it-IT".into();
    };
    match parts.next() {
        Some(region) => format!(
            "{}-{}",
            primary.to_ascii_lowercase(),
            region.to_ascii_uppercase()
        ),
        None => primary.to_ascii_lowercase(),
    }
}

/// Rate and pitch offsets look like `+10%` or `-5Hz`. Anything else falls
/// back to `fallback`.
fn normalize_offset(raw: &str, unit: &str, fallback: &str) -> String {
    let value = raw.trim();
    let Some(number) = value.strip_suffix(unit) else {
        return fallback.into();
    };
    let digits = number.trim_start_matches(['+', '-']);
    let signed = number.len() == digits.len() + 1;
    if !signed || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return fallback.into();
    }
    value.into()
}

/// Directory holding `settings.json` and `prefs.json`. `PETVOICE_DATA_DIR`
/// overrides the platform default.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PETVOICE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Petvoice")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("petvoice")
    }
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

pub fn prefs_path(data_dir: &Path) -> PathBuf {
    data_dir.join("prefs.json")
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
