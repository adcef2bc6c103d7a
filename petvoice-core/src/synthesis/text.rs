//! Text preparation and cache keys.

/// Cut `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Trim and collapse every whitespace run to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `voice::normalized text`. Two requests that differ only in spacing share
/// an entry.
pub fn cache_key(voice: &str, text: &str) -> String {
    format!("{voice}::{}", normalize(text))
}
