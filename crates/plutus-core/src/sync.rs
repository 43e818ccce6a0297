//! Outcome bookkeeping for persistence and whole runs.
//!
//! Pure counting logic, decoupled from I/O so the pipeline, the CLI and tests all
//! read the same numbers.

use serde::Serialize;

/// Outcome of upserting a single record into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No row existed for the ticker.
    Created,
    /// An existing row was overwritten.
    Updated,
}

/// Counters for one persist call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PersistStats {
    /// Rows appended to the flat-file sink.
    pub written: usize,
    pub created: usize,
    pub updated: usize,
    /// Records whose upsert failed. Failures are not rolled back.
    pub failed: usize,
    /// Tickers of the failed records, in processing order.
    pub failed_tickers: Vec<String>,
}

impl PersistStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful upsert.
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    /// Records a failed upsert for `ticker`.
    pub fn record_failure(&mut self, ticker: &str) {
        self.failed += 1;
        self.failed_tickers.push(ticker.to_string());
    }

    /// Records that reached the store.
    pub fn upserted(&self) -> usize {
        self.created + self.updated
    }

    /// Records the store was asked to persist.
    pub fn total(&self) -> usize {
        self.upserted() + self.failed
    }
}

/// Summary of one complete run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Raw records received from the API, duplicates included.
    pub fetched: usize,
    /// Pages requested, the first one included.
    pub pages: usize,
    /// Records left after normalization and key checks.
    pub normalized: usize,
    /// Raw records dropped for lacking a ticker.
    pub dropped: usize,
    /// Raw records collapsed into an earlier record with the same ticker.
    pub duplicates: usize,
    pub persist: PersistStats,
}

impl RunSummary {
    /// True when every normalized record reached the store.
    pub fn is_clean(&self) -> bool {
        self.persist.failed == 0
    }
}
