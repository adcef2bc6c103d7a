//! User preferences for speech output.
//!
//! Values are read once when the [`PreferenceStore`] is built and written
//! through on every change. Storage failures never reach the caller: a bad
//! read falls back to the default for that key, a failed write is logged and
//! the in-memory value still changes.

pub mod store;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

pub const AUTOPLAY_KEY: &str = "petvoice.tts.autoplay";
pub const VOLUME_KEY: &str = "petvoice.tts.volume";
pub const VOICE_KEY: &str = "petvoice.tts.voice";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub auto_play: bool,
    /// Output gain in `[0.0, 1.0]`.
    pub volume: f32,
    /// Empty means "default voice for the configured language".
    pub selected_voice_id: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_play: false,
            volume: 1.0,
            selected_voice_id: String::new(),
        }
    }
}

/// Clamp a requested gain into `[0.0, 1.0]`. NaN is treated as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

pub struct PreferenceStore {
    backend: Arc<dyn KeyValueStore>,
    current: Mutex<Preferences>,
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("current", &*self.current.lock())
            .finish_non_exhaustive()
    }
}

impl PreferenceStore {
    /// Load every key from `backend`, defaulting each one independently.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let defaults = Preferences::default();
        let prefs = Preferences {
            auto_play: read_key(backend.as_ref(), AUTOPLAY_KEY, |raw| raw.parse::<bool>().ok())
                .unwrap_or(defaults.auto_play),
            volume: read_key(backend.as_ref(), VOLUME_KEY, |raw| {
                raw.parse::<f32>().ok().filter(|v| v.is_finite())
            })
            .map(clamp_volume)
            .unwrap_or(defaults.volume),
            selected_voice_id: read_key(backend.as_ref(), VOICE_KEY, |raw| Some(raw.to_string()))
                .unwrap_or(defaults.selected_voice_id),
        };
        debug!(?prefs, "preferences loaded");
        Self {
            backend,
            current: Mutex::new(prefs),
        }
    }

    /// Defaults only, nothing persisted.
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryStore::new()))
    }

    pub fn snapshot(&self) -> Preferences {
        self.current.lock().clone()
    }

    pub fn auto_play(&self) -> bool {
        self.current.lock().auto_play
    }

    pub fn volume(&self) -> f32 {
        self.current.lock().volume
    }

    pub fn selected_voice_id(&self) -> String {
        self.current.lock().selected_voice_id.clone()
    }

    /// Store the clamped volume and return it.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.current.lock().volume = volume;
        self.persist(VOLUME_KEY, &volume.to_string());
        volume
    }

    pub fn set_auto_play(&self, enabled: bool) {
        self.current.lock().auto_play = enabled;
        self.persist(AUTOPLAY_KEY, if enabled { "true" } else { "false" });
    }

    /// Flip autoplay and return the new value.
    pub fn toggle_auto_play(&self) -> bool {
        let enabled = {
            let mut prefs = self.current.lock();
            prefs.auto_play = !prefs.auto_play;
            prefs.auto_play
        };
        self.persist(AUTOPLAY_KEY, if enabled { "true" } else { "false" });
        enabled
    }

    pub fn set_selected_voice_id(&self, voice_id: &str) {
        let voice_id = voice_id.trim().to_string();
        self.persist(VOICE_KEY, &voice_id);
        self.current.lock().selected_voice_id = voice_id;
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(key, "failed to persist preference: {e}");
        }
    }
}

fn read_key<T>(
    store: &dyn KeyValueStore,
    key: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => {
            let parsed = parse(raw.trim());
            if parsed.is_none() {
                warn!(key, raw = raw.as_str(), "ignoring unparsable preference");
            }
            parsed
        }
        Ok(None) => None,
        Err(e) => {
            warn!(key, "preference storage unavailable: {e}");
            None
        }
    }
}
