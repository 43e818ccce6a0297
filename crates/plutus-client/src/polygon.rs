//! Client for the Polygon reference tickers endpoint (`/v3/reference/tickers`).
//!
//! The endpoint is cursor-paginated: every response may carry a `next_url` that
//! already encodes the query, and only lacks the credential.
//!
//! ```json
//! {
//!     "results": [{"ticker": "A", "name": "Agilent Technologies Inc.", ...}],
//!     "status": "OK",
//!     "count": 1000,
//!     "next_url": "https://api.polygon.io/v3/reference/tickers?cursor=YWN0aXZlPXRy..."
//! }
//! ```
//!
//! The client issues one request per call and maps every failure onto an
//! [`AppError`] variant; pacing and retries belong to the core rate limiter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use plutus_core::error::AppError;
use plutus_core::traits::{CatalogClient, CatalogPage};
use plutus_core::{ApiKey, CatalogQuery, HttpConfig, RawRecord};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

/// Path of the tickers endpoint, relative to the base URL.
const TICKERS_PATH: &str = "v3/reference/tickers";

/// Query parameter carrying the credential.
const API_KEY_PARAM: &str = "apiKey";

/// Response envelope of the tickers endpoint.
///
/// `results` is absent on an empty page, so it defaults to an empty list.
#[derive(Deserialize, Debug)]
struct TickersResponse {
    #[serde(default)]
    results: Option<Vec<RawRecord>>,
    #[serde(default)]
    next_url: Option<String>,
}

/// HTTP client for the Polygon reference catalog.
///
/// # Examples
///
/// ```no_run
/// use plutus_client::PolygonClient;
/// use plutus_core::{ApiKey, CatalogQuery, HttpConfig};
/// use plutus_core::traits::CatalogClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = ApiKey::new(std::env::var("POLYGON_API_KEY")?)?;
/// let client = PolygonClient::new(&HttpConfig::default(), key)?;
/// let page = client.fetch_first(&CatalogQuery::default()).await?;
/// println!("First page has {} tickers", page.results.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PolygonClient {
    client: Client,
    base_url: Url,
    api_key: ApiKey,
    timeout: Duration,
}

impl PolygonClient {
    /// Creates a client for the given base URL and credential.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the base URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig, api_key: ApiKey) -> Result<Self, AppError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|_| AppError::InvalidUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidUrl(config.base_url.clone()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("plutus/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the first-page URL: query parameters followed by the credential.
    pub fn tickers_url(&self, query: &CatalogQuery) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join(TICKERS_PATH)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_pairs() {
                pairs.append_pair(key, &value);
            }
            pairs.append_pair(API_KEY_PARAM, self.api_key.expose());
        }
        Ok(url)
    }

    /// Resolves a server-supplied continuation, appending the credential when the
    /// server did not include it. Relative continuations resolve against the base URL.
    pub fn continuation_url(&self, next_url: &str) -> Result<Url, AppError> {
        let resolved = if next_url.contains("://") {
            Url::parse(next_url)
        } else {
            self.base_url.join(next_url.trim_start_matches('/'))
        };
        let mut url = resolved.map_err(|_| AppError::InvalidUrl(next_url.to_string()))?;

        let has_key = url.query_pairs().any(|(k, _)| k == API_KEY_PARAM);
        if !has_key {
            url.query_pairs_mut()
                .append_pair(API_KEY_PARAM, self.api_key.expose());
        }
        Ok(url)
    }

    async fn get_page(&self, url: Url) -> Result<CatalogPage, AppError> {
        let shown = redacted(&url);
        tracing::debug!(url = %shown, "Requesting catalog page");

        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else if e.is_connect() || e.is_request() {
                AppError::NetworkError(format!("Connection failed: {}", e.without_url()))
            } else {
                AppError::ClientError(e.without_url().to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp.headers(), &shown));
        }

        let body: TickersResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::ClientError(format!("Invalid response body: {}", e.without_url()))
            }
        })?;

        Ok(CatalogPage {
            results: body.results.unwrap_or_default(),
            next_url: body.next_url.filter(|u| !u.is_empty()),
        })
    }
}

impl CatalogClient for PolygonClient {
    async fn fetch_first(&self, query: &CatalogQuery) -> Result<CatalogPage, AppError> {
        let url = self.tickers_url(query)?;
        self.get_page(url).await
    }

    async fn fetch_next(&self, next_url: &str) -> Result<CatalogPage, AppError> {
        let url = self.continuation_url(next_url)?;
        self.get_page(url).await
    }
}

/// Maps a non-success status onto the error taxonomy.
fn status_error(status: StatusCode, headers: &reqwest::header::HeaderMap, url: &str) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimitExceeded {
            retry_after: headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now())),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::AuthenticationFailed(format!("HTTP {} from {}", status.as_u16(), url))
        }
        s if s.is_server_error() => AppError::ServerError(s.as_u16()),
        s => AppError::ClientError(format!("HTTP {} from {}", s.as_u16(), url)),
    }
}

/// Parses a `Retry-After` value given either as delta-seconds or as an HTTP-date.
///
/// A date already in the past yields a zero wait.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

/// URL without its query string, safe to log.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
