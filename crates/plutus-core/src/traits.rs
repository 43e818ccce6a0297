//! Trait definitions for external dependencies.
//!
//! The pipeline talks to the catalog API and to the persistent store only through
//! these traits, so the core logic can be exercised with in-memory mocks and the
//! concrete backends live in their own crates (`plutus-client`, `plutus-db`).
//!
//! # Example
//!
//! ```
//! use plutus_core::traits::{CatalogClient, InstrumentStore};
//! use plutus_core::{AppError, CatalogQuery};
//!
//! // Business logic uses traits, not concrete types
//! async fn first_page_size<C: CatalogClient>(
//!     client: &C,
//!     query: &CatalogQuery,
//! ) -> Result<usize, AppError> {
//!     Ok(client.fetch_first(query).await?.results.len())
//! }
//! ```

use std::future::Future;

use crate::config::CatalogQuery;
use crate::models::{InstrumentRecord, RawRecord, StoreStats};
use crate::sync::UpsertOutcome;
use crate::AppError;

/// One page of the catalog as returned by the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    /// Raw records on this page. An absent `results` field yields an empty vector.
    pub results: Vec<RawRecord>,
    /// Opaque continuation URL; `None` once the last page was served.
    pub next_url: Option<String>,
}

impl CatalogPage {
    pub fn has_next(&self) -> bool {
        self.next_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Client for the paginated reference catalog API.
///
/// Implementations issue exactly one HTTP request per call and map failures onto
/// [`AppError`] so the rate limiter can classify them. Pacing and retries are not
/// the client's concern.
pub trait CatalogClient: Send + Sync + Clone {
    /// Fetches the first page for `query`. The credential is attached by the client.
    fn fetch_first(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = Result<CatalogPage, AppError>> + Send;

    /// Follows a continuation URL taken from a previous page.
    ///
    /// The credential is appended when the URL does not already carry it.
    fn fetch_next(
        &self,
        next_url: &str,
    ) -> impl Future<Output = Result<CatalogPage, AppError>> + Send;
}

/// Store for normalized instruments, keyed uniquely on `ticker`.
pub trait InstrumentStore: Send + Sync + Clone {
    /// Creates the backing table if it does not exist yet. Never drops data.
    fn ensure_schema(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Inserts the record or overwrites every non-key column of the existing row.
    fn upsert(
        &self,
        record: &InstrumentRecord,
    ) -> impl Future<Output = Result<UpsertOutcome, AppError>> + Send;

    /// Returns aggregate statistics about the stored instruments.
    fn stats(&self) -> impl Future<Output = Result<StoreStats, AppError>> + Send;

    /// Verifies the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
