//! One ingestion run: fetch, normalize, persist.
//!
//! # Example
//!
//! ```ignore
//! use plutus_core::{IngestPipeline, PipelineConfig};
//!
//! let pipeline = IngestPipeline::new(polygon_client, repository, PipelineConfig::default());
//! let summary = pipeline.run_once().await?;
//! println!("{} fetched, {} upserted", summary.fetched, summary.persist.upserted());
//! ```

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::fetcher::PagedFetcher;
use crate::normalize::normalize_batch;
use crate::persist::SinkWriter;
use crate::progress::{ProgressReporter, RunEvent, SilentReporter};
use crate::rate_limiter::RateLimiter;
use crate::sink::FileSink;
use crate::sync::RunSummary;
use crate::traits::{CatalogClient, InstrumentStore};

/// Sequential fetch → normalize → persist pipeline.
///
/// The pipeline owns the [`RateLimiter`] for its whole lifetime, so calling
/// [`run_once`](Self::run_once) repeatedly keeps pacing across runs. Runs must not
/// overlap; callers serialize them.
pub struct IngestPipeline<C, S>
where
    C: CatalogClient,
    S: InstrumentStore,
{
    fetcher: PagedFetcher<C>,
    writer: SinkWriter<S>,
    limiter: Arc<RateLimiter>,
}

impl<C, S> IngestPipeline<C, S>
where
    C: CatalogClient,
    S: InstrumentStore,
{
    /// Creates a pipeline with its own rate limiter.
    pub fn new(client: C, store: S, config: PipelineConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self::with_limiter(client, store, limiter, config)
    }

    /// Creates a pipeline sharing an existing rate limiter.
    pub fn with_limiter(
        client: C,
        store: S,
        limiter: Arc<RateLimiter>,
        config: PipelineConfig,
    ) -> Self {
        let writer = SinkWriter::new(FileSink::from_config(&config.sink), store);
        let fetcher = PagedFetcher::new(client, Arc::clone(&limiter), config.fetch);
        Self {
            fetcher,
            writer,
            limiter,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    /// Runs once, stamping records with today's local date.
    pub async fn run_once(&self) -> Result<RunSummary, AppError> {
        self.run_once_on(Local::now().date_naive()).await
    }

    /// Runs once with an explicit date stamp.
    pub async fn run_once_on(&self, date_stamp: NaiveDate) -> Result<RunSummary, AppError> {
        self.run_once_cancellable(date_stamp, &SilentReporter, CancellationToken::new())
            .await
    }

    /// Runs once with progress reporting and cancellation.
    ///
    /// The token is honored between pages and once more before anything is
    /// persisted; a cancelled run writes nothing and returns [`AppError::Cancelled`].
    ///
    /// # Errors
    ///
    /// - [`AppError::ExhaustedRetries`] or any non-retryable API error aborts the run
    ///   before either sink is touched.
    /// - [`AppError::SinkError`] if the file sink cannot be written.
    ///
    /// Store failures for individual records are not errors; they are counted in the
    /// returned summary.
    pub async fn run_once_cancellable<R: ProgressReporter>(
        &self,
        date_stamp: NaiveDate,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<RunSummary, AppError> {
        let stamp = date_stamp.format("%Y-%m-%d").to_string();
        reporter.report(RunEvent::Started { date_stamp: &stamp });

        let fetched = match self
            .fetcher
            .fetch_all_cancellable(reporter, cancel_token.clone())
            .await
        {
            Ok(fetched) => fetched,
            Err(AppError::Cancelled) => {
                reporter.report(RunEvent::Cancelled { pages: 0 });
                return Err(AppError::Cancelled);
            }
            Err(e) => return Err(e),
        };

        let batch = normalize_batch(&fetched.records, date_stamp);

        if cancel_token.is_cancelled() {
            reporter.report(RunEvent::Cancelled {
                pages: fetched.pages,
            });
            return Err(AppError::Cancelled);
        }

        reporter.report(RunEvent::Persisting {
            records: batch.records.len(),
        });
        let persist = self
            .writer
            .persist_with_progress(&batch.records, reporter)
            .await?;

        let summary = RunSummary {
            fetched: fetched.records.len(),
            pages: fetched.pages,
            normalized: batch.records.len(),
            dropped: batch.dropped,
            duplicates: batch.duplicates,
            persist,
        };
        reporter.report(RunEvent::Completed { summary: &summary });

        Ok(summary)
    }
}
