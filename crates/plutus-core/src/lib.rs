//! Plutus Core - Domain types, rate-limited paging and persistence.
//!
//! This crate provides the core functionality for Plutus, including:
//!
//! - **Domain models**: [`InstrumentRecord`], [`RawRecord`], [`StoreStats`]
//! - **Rate limiting**: [`RateLimiter`], the single choke point for outbound API calls
//! - **Pagination**: [`PagedFetcher`] follows `next_url` up to a page cap
//! - **Normalization**: [`normalize`] / [`normalize_batch`] map raw records onto the fixed schema
//! - **Persistence**: [`FileSink`] and [`SinkWriter`] write to the flat file and the store
//! - **Services**: [`IngestPipeline`] runs fetch → normalize → persist once
//! - **Traits**: [`CatalogClient`], [`InstrumentStore`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits:
//!
//! - [`CatalogClient`] - abstracts the paginated catalog API (e.g., Polygon)
//! - [`InstrumentStore`] - abstracts the keyed store (e.g., PostgreSQL)
//!
//! # Example
//!
//! ```ignore
//! use plutus_core::{IngestPipeline, PipelineConfig, TracingReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = IngestPipeline::new(client, repository, PipelineConfig::default());
//! let summary = pipeline
//!     .run_once_cancellable(today, &TracingReporter, CancellationToken::new())
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod rate_limiter;
pub mod sink;
pub mod sync;
pub mod traits;

// Configuration
pub use config::{
    API_KEY_ENV, ApiKey, CatalogQuery, DEFAULT_BASE_URL, DbConfig, FetchConfig, HttpConfig,
    MAX_PAGE_LIMIT, PipelineConfig, RateLimitConfig, SinkConfig,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{FIELD_NAMES, InstrumentRecord, RawRecord, StoreStats};

// Rate limiting and paging
pub use fetcher::{FetchedCatalog, PagedFetcher};
pub use rate_limiter::{RateLimiter, RetryDecision};

// Normalization
pub use normalize::{NormalizedBatch, normalize, normalize_batch};

// Persistence
pub use persist::SinkWriter;
pub use sink::FileSink;
pub use sync::{PersistStats, RunSummary, UpsertOutcome};

// Progress reporting
pub use progress::{ProgressReporter, RunEvent, SilentReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{CatalogClient, CatalogPage, InstrumentStore};

// Services
pub use pipeline::IngestPipeline;
