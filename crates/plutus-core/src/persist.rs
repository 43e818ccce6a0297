//! Persistence of one run's records to the file sink and the store.
//!
//! The file append happens first and is all-or-nothing for the run: if it fails the
//! store is not touched. Store upserts are best effort; a failing record is counted
//! and reported, the remaining records are still written, and nothing is rolled back.

use crate::error::AppError;
use crate::models::InstrumentRecord;
use crate::progress::{ProgressReporter, RunEvent, SilentReporter};
use crate::sink::FileSink;
use crate::sync::PersistStats;
use crate::traits::InstrumentStore;

/// Writes normalized records to both sinks.
#[derive(Debug, Clone)]
pub struct SinkWriter<S: InstrumentStore> {
    file: FileSink,
    store: S,
}

impl<S: InstrumentStore> SinkWriter<S> {
    pub fn new(file: FileSink, store: S) -> Self {
        Self { file, store }
    }

    pub fn file(&self) -> &FileSink {
        &self.file
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists `records`, returning per-sink counts.
    pub async fn persist(&self, records: &[InstrumentRecord]) -> Result<PersistStats, AppError> {
        self.persist_with_progress(records, &SilentReporter).await
    }

    /// Same as [`persist`](Self::persist), emitting a [`RunEvent::RecordFailed`] for
    /// every record the store rejected.
    ///
    /// # Errors
    ///
    /// Only a file sink failure is returned as an error. Store failures are reported
    /// through [`PersistStats::failed`].
    pub async fn persist_with_progress<R: ProgressReporter>(
        &self,
        records: &[InstrumentRecord],
        reporter: &R,
    ) -> Result<PersistStats, AppError> {
        let mut stats = PersistStats::new();
        stats.written = self.file.append(records)?;

        for record in records {
            match self.store.upsert(record).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    reporter.report(RunEvent::RecordFailed {
                        ticker: &record.ticker,
                        error: &e,
                    });
                    stats.record_failure(&record.ticker);
                }
            }
        }

        if stats.failed > 0 {
            tracing::warn!(
                failed = stats.failed,
                upserted = stats.upserted(),
                "Some records could not be upserted"
            );
        }

        Ok(stats)
    }
}
