//! Observer passed to the resolver and marker cache in place of a global
//! debug switch.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::MapError;

pub trait Diagnostics: Send + Sync {
    /// A field could not be read; the caller substitutes a placeholder.
    fn extraction_failed(&self, error: &MapError);
    /// A whole entity was dropped from a marker list or bulk load.
    fn entity_skipped(&self, kind: &str, id: u32, error: &MapError);
    /// An entity was kept without a usable map position.
    fn unresolved(&self, kind: &str, id: u32, reason: &str);
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn extraction_failed(&self, error: &MapError) {
        log::debug!("extraction failed: {error}");
    }

    fn entity_skipped(&self, kind: &str, id: u32, error: &MapError) {
        log::warn!("skipping {kind} {id}: {error}");
    }

    fn unresolved(&self, kind: &str, id: u32, reason: &str) {
        log::debug!("{kind} {id} unresolved: {reason}");
    }
}

/// Aggregated failure counters for one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub processed: usize,
    pub extraction_failures: usize,
    pub skipped: usize,
    pub unresolved: usize,
}

#[derive(Debug, Default)]
struct Counters {
    extraction_failures: AtomicUsize,
    skipped: AtomicUsize,
    unresolved: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> LoadStats {
        LoadStats {
            processed: 0,
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
        }
    }
}

/// Counts events and forwards them to [`LogDiagnostics`].
#[derive(Debug, Default)]
pub struct CountingDiagnostics {
    counters: Counters,
}

impl CountingDiagnostics {
    pub fn snapshot(&self) -> LoadStats {
        self.counters.snapshot()
    }
}

impl Diagnostics for CountingDiagnostics {
    fn extraction_failed(&self, error: &MapError) {
        self.counters.extraction_failures.fetch_add(1, Ordering::Relaxed);
        LogDiagnostics.extraction_failed(error);
    }

    fn entity_skipped(&self, kind: &str, id: u32, error: &MapError) {
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        LogDiagnostics.entity_skipped(kind, id, error);
    }

    fn unresolved(&self, kind: &str, id: u32, reason: &str) {
        self.counters.unresolved.fetch_add(1, Ordering::Relaxed);
        LogDiagnostics.unresolved(kind, id, reason);
    }
}

/// Counts the events of one bulk load while passing them on to `inner`.
pub struct LoadTally<'a> {
    inner: &'a dyn Diagnostics,
    counters: Counters,
    processed: usize,
}

impl<'a> LoadTally<'a> {
    pub fn new(inner: &'a dyn Diagnostics) -> Self {
        Self {
            inner,
            counters: Counters::default(),
            processed: 0,
        }
    }

    pub fn processed(&mut self) {
        self.processed += 1;
    }

    /// Counts an unresolved entity that was already reported elsewhere.
    pub fn count_unresolved(&self) {
        self.counters.unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish(self) -> LoadStats {
        LoadStats {
            processed: self.processed,
            ..self.counters.snapshot()
        }
    }
}

impl Diagnostics for LoadTally<'_> {
    fn extraction_failed(&self, error: &MapError) {
        self.counters.extraction_failures.fetch_add(1, Ordering::Relaxed);
        self.inner.extraction_failed(error);
    }

    fn entity_skipped(&self, kind: &str, id: u32, error: &MapError) {
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        self.inner.entity_skipped(kind, id, error);
    }

    fn unresolved(&self, kind: &str, id: u32, reason: &str) {
        self.counters.unresolved.fetch_add(1, Ordering::Relaxed);
        self.inner.unresolved(kind, id, reason);
    }
}

/// Unwraps a field read, reporting failures and falling back to `placeholder`.
pub fn or_placeholder<T>(
    result: Result<T, MapError>,
    placeholder: T,
    diagnostics: &dyn Diagnostics,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            diagnostics.extraction_failed(&err);
            placeholder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_diagnostics_tracks_each_kind() {
        let diagnostics = CountingDiagnostics::default();
        let value = or_placeholder(Err(MapError::SourceUnavailable), 200u16, &diagnostics);
        assert_eq!(value, 200);
        assert_eq!(or_placeholder(Ok(7u16), 200, &diagnostics), 7);
        diagnostics.entity_skipped("fate", 3, &MapError::MapNotFound(9));
        diagnostics.unresolved("npc", 4, "no territory");
        diagnostics.unresolved("npc", 5, "no territory");

        let stats = diagnostics.snapshot();
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.unresolved, 2);
    }

    #[test]
    fn load_tally_forwards_and_counts() {
        let inner = CountingDiagnostics::default();
        let mut tally = LoadTally::new(&inner);
        tally.processed();
        tally.processed();
        tally.extraction_failed(&MapError::SourceUnavailable);
        tally.count_unresolved();
        let stats = tally.finish();
        assert_eq!(
            stats,
            LoadStats {
                processed: 2,
                extraction_failures: 1,
                skipped: 0,
                unresolved: 1,
            }
        );
        assert_eq!(inner.snapshot().extraction_failures, 1);
        assert_eq!(inner.snapshot().unresolved, 0);
    }
}
