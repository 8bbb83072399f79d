//! Observability hooks for the pipeline.
//!
//! Components report what they do through an injected [`PipelineObserver`]
//! instead of printing status. Human readable progress still goes through the
//! `log` facade; observers are meant for counters and tests.

use crate::types::datatype::Table;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Receives structured events from the pipeline components.
///
/// All methods default to doing nothing so implementors only override what
/// they care about.
pub trait PipelineObserver: Send + Sync {
    /// A page request is about to be issued at `offset`.
    fn page_requested(&self, _offset: u64) {}

    /// A record with an unsupported datatype tag was dropped.
    fn record_skipped(&self, _datatype: &str) {}

    /// A batch of `size` records was handed to the stream; `total` is the
    /// running number of records flushed by this batcher.
    fn batch_flushed(&self, _size: usize, _total: usize) {}

    /// `count` records were written to `table` in one store call.
    fn records_written(&self, _table: Table, _count: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

pub(crate) fn noop() -> Arc<dyn PipelineObserver> {
    Arc::new(NoopObserver)
}

/// Counting observer.
///
/// Share it through an `Arc` and read the counters once the run is done.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pages_requested: AtomicUsize,
    records_skipped: AtomicUsize,
    batches_flushed: AtomicUsize,
    records_flushed: AtomicUsize,
    precipitation_written: AtomicUsize,
    temperature_written: AtomicUsize,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_requested: usize,
    pub records_skipped: usize,
    pub batches_flushed: usize,
    pub records_flushed: usize,
    pub precipitation_written: usize,
    pub temperature_written: usize,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_requested: self.pages_requested.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            precipitation_written: self.precipitation_written.load(Ordering::Relaxed),
            temperature_written: self.temperature_written.load(Ordering::Relaxed),
        }
    }
}

impl PipelineObserver for PipelineStats {
    fn page_requested(&self, _offset: u64) {
        self.pages_requested.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self, _datatype: &str) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn batch_flushed(&self, size: usize, _total: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.records_flushed.fetch_add(size, Ordering::Relaxed);
    }

    fn records_written(&self, table: Table, count: usize) {
        let counter = match table {
            Table::Precipitation => &self.precipitation_written,
            Table::Temperature => &self.temperature_written,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_count_events() {
        let stats = PipelineStats::new();
        stats.page_requested(0);
        stats.page_requested(500);
        stats.record_skipped("AWND");
        stats.batch_flushed(500, 500);
        stats.batch_flushed(20, 520);
        stats.records_written(Table::Precipitation, 25);
        stats.records_written(Table::Temperature, 3);
        stats.records_written(Table::Temperature, 4);

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                pages_requested: 2,
                records_skipped: 1,
                batches_flushed: 2,
                records_flushed: 520,
                precipitation_written: 25,
                temperature_written: 7,
            }
        );
    }
}
