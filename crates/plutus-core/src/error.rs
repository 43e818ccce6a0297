use std::time::Duration;

use thiserror::Error;

/// Application-wide error types.
///
/// The variants follow the failure taxonomy of an ingestion run:
///
/// - throttling and transient network failures ([`AppError::RateLimitExceeded`],
///   [`AppError::NetworkError`], [`AppError::Timeout`], [`AppError::ServerError`]) are
///   retried by the rate limiter and only surface wrapped in
///   [`AppError::ExhaustedRetries`];
/// - persistence failures ([`AppError::DatabaseError`]) are counted per record;
/// - configuration failures ([`AppError::MissingCredential`], [`AppError::ConfigError`])
///   are raised before any network call.
///
/// Most library errors convert automatically through `#[from]`:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` / `csv::Error` → `AppError::SinkError`
///
/// # Examples
///
/// ```
/// use plutus_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// assert!(example().is_err());
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures, query errors,
    /// and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// The API answered with a response the client could not use.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The API signaled that the permitted call rate was exceeded (HTTP 429).
    ///
    /// `retry_after` carries the server's `Retry-After` hint when one was sent.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// The API failed with a 5xx status.
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// The API rejected the credential (HTTP 401/403).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A call kept failing with retryable errors until the attempt cap was reached.
    #[error("Giving up after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        last_error: Box<AppError>,
    },

    /// No API credential was configured.
    #[error("Missing API credential: set {0}")]
    MissingCredential(&'static str),

    /// Configuration value missing or out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Writing the flat-file sink failed.
    #[error("Sink error: {0}")]
    SinkError(String),

    /// The run was cancelled before it completed.
    #[error("Run cancelled")]
    Cancelled,

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::SinkError(e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::SinkError(e.to_string())
    }
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_HOST / DATABASE_URL.".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The API may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded { .. } => {
                "Too many requests. Lower PLUTUS_CALLS_PER_MINUTE or wait before retrying."
                    .to_string()
            }
            AppError::AuthenticationFailed(_) => {
                "The API rejected the credential.\n   Check your POLYGON_API_KEY environment variable."
                    .to_string()
            }
            AppError::ExhaustedRetries {
                attempts,
                last_error,
            } => {
                format!(
                    "Fetch aborted after {} attempts.\n   Last error: {}",
                    attempts,
                    last_error.user_message()
                )
            }
            AppError::MissingCredential(var) => {
                format!("No API key configured.\n   Set {} in the environment or .env file.", var)
            }
            AppError::ConfigError(msg) => {
                format!("Configuration error: {}\n   Check your environment variables.", msg)
            }
            AppError::SinkError(msg) => {
                format!("Cannot write output file: {}", msg)
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is worth another attempt after a backoff.
    ///
    /// # Examples
    ///
    /// ```
    /// use plutus_core::error::AppError;
    ///
    /// assert!(AppError::RateLimitExceeded { retry_after: None }.is_retryable());
    /// assert!(AppError::NetworkError("connection reset".to_string()).is_retryable());
    /// assert!(!AppError::AuthenticationFailed("bad key".to_string()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded { .. }
                | AppError::ServerError(_)
        )
    }

    /// Returns true if the server explicitly throttled the call.
    pub fn is_throttled(&self) -> bool {
        matches!(self, AppError::RateLimitExceeded { .. })
    }

    /// Server-supplied minimum wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimitExceeded { retry_after } => *retry_after,
            _ => None,
        }
    }
}
