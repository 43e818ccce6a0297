//! Configuration types for Plutus components.
//!
//! Every struct carries the production defaults through `Default`; the CLI layers
//! environment variables and flags on top and calls [`PipelineConfig::validate`]
//! before anything touches the network.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Environment variable holding the catalog API credential.
pub const API_KEY_ENV: &str = "POLYGON_API_KEY";

/// Default base URL of the reference catalog API.
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Largest page size the catalog API accepts.
pub const MAX_PAGE_LIMIT: u32 = 1000;

// =============================================================================
// Credential
// =============================================================================

/// Opaque API credential.
///
/// The value is never printed: `Debug` and `Display` render a placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a credential, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::MissingCredential(API_KEY_ENV));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Builds a credential from an optional source such as an environment variable.
    pub fn from_optional(value: Option<String>) -> Result<Self, AppError> {
        match value {
            Some(v) => Self::new(v),
            None => Err(AppError::MissingCredential(API_KEY_ENV)),
        }
    }

    /// Returns the raw credential for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

/// Call pacing and retry policy for outbound API calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Calls permitted per minute by the API plan.
    pub calls_per_minute: u32,
    /// Fixed delay added on top of the per-call interval.
    pub extra_delay: Duration,
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: 5,
            extra_delay: Duration::ZERO,
            max_attempts: 3,
        }
    }
}

impl RateLimitConfig {
    /// Minimum spacing between two call starts: `60 / calls_per_minute + extra_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use plutus_core::RateLimitConfig;
    /// use std::time::Duration;
    ///
    /// let config = RateLimitConfig::default();
    /// assert_eq!(config.min_interval(), Duration::from_secs(12));
    /// ```
    pub fn min_interval(&self) -> Duration {
        let per_call = Duration::from_secs(60) / self.calls_per_minute.max(1);
        per_call + self.extra_delay
    }

    pub fn with_calls_per_minute(mut self, calls: u32) -> Self {
        self.calls_per_minute = calls;
        self
    }

    pub fn with_extra_delay(mut self, delay: Duration) -> Self {
        self.extra_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.calls_per_minute == 0 {
            return Err(AppError::ConfigError(
                "calls per minute must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::ConfigError(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Catalog query / paging
// =============================================================================

/// Query parameters for the first catalog page.
///
/// Continuation pages reuse whatever the server encodes in its `next_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Market segment filter (`stocks`, `crypto`, `fx`, `otc`, `indices`).
    pub market: String,
    /// Only return instruments that are actively traded.
    pub active: bool,
    /// Sort direction (`asc` / `desc`).
    pub order: String,
    /// Field to sort by.
    pub sort: String,
    /// Page size.
    pub limit: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            market: "stocks".to_string(),
            active: true,
            order: "asc".to_string(),
            sort: "ticker".to_string(),
            limit: MAX_PAGE_LIMIT,
        }
    }
}

impl CatalogQuery {
    /// Returns the query as ordered key/value pairs, credential excluded.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("market", self.market.clone()),
            ("active", self.active.to_string()),
            ("order", self.order.clone()),
            ("limit", self.limit.to_string()),
            ("sort", self.sort.clone()),
        ]
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(AppError::ConfigError(format!(
                "page limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.limit
            )));
        }
        if self.market.trim().is_empty() {
            return Err(AppError::ConfigError("market must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Pagination bounds for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub query: CatalogQuery,
    /// Continuation pages followed after the first one. A run issues at most
    /// `max_pages + 1` requests.
    pub max_pages: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            query: CatalogQuery::default(),
            max_pages: 4,
        }
    }
}

// =============================================================================
// HTTP / database / sink
// =============================================================================

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Database connection configuration.
///
/// A full `url` takes precedence over the individual parts.
#[derive(Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "plutus".to_string(),
            password: String::new(),
            database: "plutus".to_string(),
            max_connections: 5,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Flat-file sink location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tickers.csv"),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Everything one ingestion run needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub rate_limit: RateLimitConfig,
    pub fetch: FetchConfig,
    pub sink: SinkConfig,
}

impl PipelineConfig {
    /// Checks every section, failing on the first invalid value.
    pub fn validate(&self) -> Result<(), AppError> {
        self.rate_limit.validate()?;
        self.fetch.query.validate()?;
        if self.sink.path.as_os_str().is_empty() {
            return Err(AppError::ConfigError("sink path must not be empty".to_string()));
        }
        Ok(())
    }
}
