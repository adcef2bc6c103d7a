//! Default neural voice per language.

/// Voice used when neither the request nor the preferences name one.
pub const FALLBACK_VOICE: &str = "en-US-JennyNeural";

const DEFAULT_VOICES: &[(&str, &str)] = &[
    ("it", "it-IT-ElsaNeural"),
    ("en", FALLBACK_VOICE),
    ("es", "es-ES-ElviraNeural"),
    ("fr", "fr-FR-DeniseNeural"),
    ("de", "de-DE-KatjaNeural"),
    ("pt", "pt-BR-FranciscaNeural"),
];

/// Resolve the default voice id for a BCP-47 language tag by its primary
/// subtag. Unknown languages get the English voice.
pub fn default_voice_for(language: &str) -> &'static str {
    let primary = language.split(['-', '_']).next().unwrap_or_default().trim();
    DEFAULT_VOICES
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case(primary))
        .map(|(_, voice)| *voice)
        .unwrap_or(FALLBACK_VOICE)
}
