//! Progress reporting for ingestion runs.
//!
//! The pipeline emits [`RunEvent`]s instead of logging directly, so the CLI can log
//! them through `tracing` while tests and embedders stay quiet.

use tracing::{info, warn};

use crate::error::AppError;
use crate::sync::RunSummary;

/// Events emitted during a run.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// A run started for the given date stamp.
    Started { date_stamp: &'a str },
    /// A catalog page was received.
    PageFetched {
        page: usize,
        records: usize,
        total: usize,
        has_next: bool,
    },
    /// The page cap stopped pagination while a continuation was still offered.
    PageCapReached { max_pages: u32 },
    /// Fetching is done and persistence is starting.
    Persisting { records: usize },
    /// A single record could not be upserted.
    RecordFailed {
        ticker: &'a str,
        error: &'a AppError,
    },
    /// The run finished.
    Completed { summary: &'a RunSummary },
    /// The run was cancelled before persisting anything.
    Cancelled { pages: usize },
}

/// Receives run events.
pub trait ProgressReporter: Send + Sync {
    /// Called when a run event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Reporter that logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { date_stamp } => {
                info!(date_stamp, "Starting ingestion run");
            }
            RunEvent::PageFetched {
                page,
                records,
                total,
                has_next,
            } => {
                info!(page, records, total, has_next, "Fetched catalog page");
            }
            RunEvent::PageCapReached { max_pages } => {
                info!(max_pages, "Page cap reached, remaining pages skipped");
            }
            RunEvent::Persisting { records } => {
                info!(records, "Persisting records");
            }
            RunEvent::RecordFailed { ticker, error } => {
                warn!(ticker, error = %error, "Failed to upsert record");
            }
            RunEvent::Completed { summary } => {
                info!(
                    fetched = summary.fetched,
                    pages = summary.pages,
                    written = summary.persist.written,
                    created = summary.persist.created,
                    updated = summary.persist.updated,
                    failed = summary.persist.failed,
                    "Ingestion run completed"
                );
            }
            RunEvent::Cancelled { pages } => {
                info!(pages, "Ingestion run cancelled");
            }
        }
    }
}
