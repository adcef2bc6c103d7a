use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Counters updated by the synthesis engine. Relaxed ordering: these are
/// for logs and status lines, not for synchronisation.
#[derive(Debug, Default)]
pub struct SynthesisDiagnostics {
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub cache_evictions: AtomicUsize,
    pub remote_calls: AtomicUsize,
    pub remote_failures: AtomicUsize,
    pub fallback_uses: AtomicUsize,
    pub playback_errors: AtomicUsize,
    pub stale_discarded: AtomicUsize,
}

impl SynthesisDiagnostics {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.cache_evictions.store(0, Ordering::Relaxed);
        self.remote_calls.store(0, Ordering::Relaxed);
        self.remote_failures.store(0, Ordering::Relaxed);
        self.fallback_uses.store(0, Ordering::Relaxed);
        self.playback_errors.store(0, Ordering::Relaxed);
        self.stale_discarded.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            fallback_uses: self.fallback_uses.load(Ordering::Relaxed),
            playback_errors: self.playback_errors.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_evictions: usize,
    pub remote_calls: usize,
    pub remote_failures: usize,
    pub fallback_uses: usize,
    pub playback_errors: usize,
    /// Completions that arrived after a stop or a newer request.
    pub stale_discarded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_and_reset() {
        let diag = SynthesisDiagnostics::default();
        SynthesisDiagnostics::bump(&diag.cache_hits);
        SynthesisDiagnostics::bump(&diag.cache_hits);
        SynthesisDiagnostics::bump(&diag.fallback_uses);

        let snap = diag.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.fallback_uses, 1);

        diag.reset();
        assert_eq!(diag.snapshot(), DiagnosticsSnapshot::default());
    }
}
