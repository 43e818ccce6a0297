//! Cursor-based pagination over the catalog API.
//!
//! [`PagedFetcher::fetch_all`] issues the initial request, then follows `next_url`
//! until the server stops offering one or `max_pages` continuation pages were
//! followed, for at most `max_pages + 1` requests per run. Every request goes through
//! the shared [`RateLimiter`]; a request that exhausts its retries aborts the whole
//! fetch and nothing collected so far is returned.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::AppError;
use crate::models::RawRecord;
use crate::progress::{ProgressReporter, RunEvent, SilentReporter};
use crate::rate_limiter::RateLimiter;
use crate::traits::{CatalogClient, CatalogPage};

/// Raw records collected by one fetch, in server order. Duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct FetchedCatalog {
    pub records: Vec<RawRecord>,
    /// Requests that returned a page, the initial one included.
    pub pages: usize,
    /// True when pagination stopped on the page cap rather than on the last page.
    pub truncated: bool,
}

/// Drives pagination for one run.
pub struct PagedFetcher<C: CatalogClient> {
    client: C,
    limiter: Arc<RateLimiter>,
    config: FetchConfig,
}

impl<C: CatalogClient> PagedFetcher<C> {
    pub fn new(client: C, limiter: Arc<RateLimiter>, config: FetchConfig) -> Self {
        Self {
            client,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches every page up to the cap.
    pub async fn fetch_all(&self) -> Result<FetchedCatalog, AppError> {
        self.fetch_all_cancellable(&SilentReporter, CancellationToken::new())
            .await
    }

    /// Fetches every page up to the cap, reporting progress and honoring cancellation.
    ///
    /// The token is checked before every request and while a request is paced or
    /// backing off. Cancellation yields [`AppError::Cancelled`].
    pub async fn fetch_all_cancellable<R: ProgressReporter>(
        &self,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<FetchedCatalog, AppError> {
        let mut fetched = FetchedCatalog::default();
        let query = &self.config.query;

        let first = self
            .guarded(&cancel_token, || self.client.fetch_first(query))
            .await?;
        let mut next_url = self.absorb(&mut fetched, first, reporter);

        let mut followed: u32 = 0;
        while let Some(url) = next_url {
            if followed >= self.config.max_pages {
                fetched.truncated = true;
                reporter.report(RunEvent::PageCapReached {
                    max_pages: self.config.max_pages,
                });
                break;
            }

            let page = self
                .guarded(&cancel_token, || self.client.fetch_next(&url))
                .await?;
            followed += 1;
            next_url = self.absorb(&mut fetched, page, reporter);
        }

        Ok(fetched)
    }

    /// Runs one rate-limited request unless the token fires first.
    async fn guarded<F, Fut>(
        &self,
        cancel_token: &CancellationToken,
        op: F,
    ) -> Result<CatalogPage, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CatalogPage, AppError>>,
    {
        if cancel_token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        tokio::select! {
            result = self.limiter.call(op) => result,
            _ = cancel_token.cancelled() => {
                // The dropped request may already have reached the server.
                self.limiter.mark_call();
                Err(AppError::Cancelled)
            }
        }
    }

    fn absorb<R: ProgressReporter>(
        &self,
        fetched: &mut FetchedCatalog,
        page: CatalogPage,
        reporter: &R,
    ) -> Option<String> {
        let has_next = page.has_next();
        let count = page.results.len();
        fetched.pages += 1;
        fetched.records.extend(page.results);

        reporter.report(RunEvent::PageFetched {
            page: fetched.pages,
            records: count,
            total: fetched.records.len(),
            has_next,
        });

        if has_next { page.next_url } else { None }
    }
}
