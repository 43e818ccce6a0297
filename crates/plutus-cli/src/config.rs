use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use plutus_core::{
    API_KEY_ENV, ApiKey, AppError, CatalogQuery, DEFAULT_BASE_URL, DbConfig, FetchConfig,
    HttpConfig, PipelineConfig, RateLimitConfig, SinkConfig,
};

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    // Use VERGEN_GIT_SHA for the commit hash (with safe slicing)
    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"); // YYYY-MM-DD
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "plutus")]
#[command(
    author,
    version = version_info(),
    about = "Rate-limited ingestion of the reference ticker catalog"
)]
#[command(after_help = "Examples:
  plutus run                      # Fetch, normalize and persist once
  plutus daemon --at 06:30        # Run now, then every day at 06:30 local time
  plutus stats                    # Show what is stored
  plutus check                    # Validate configuration and database access

Environment:
  POLYGON_API_KEY is required for run and daemon. A .env file is read if present.")]
pub struct Config {
    /// Catalog API credential
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Catalog API base URL
    #[arg(long, env = "POLYGON_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API calls permitted per minute
    #[arg(long, env = "PLUTUS_CALLS_PER_MINUTE", default_value_t = 5)]
    pub calls_per_minute: u32,

    /// Extra delay in seconds added to every call interval
    #[arg(long, env = "PLUTUS_EXTRA_DELAY_SECS", default_value_t = 0.0)]
    pub extra_delay_secs: f64,

    /// Attempts per API call, the first one included
    #[arg(long, env = "PLUTUS_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Continuation pages followed after the first page
    #[arg(long, env = "PLUTUS_MAX_PAGES", default_value_t = 4)]
    pub max_pages: u32,

    /// Records requested per page (1-1000)
    #[arg(long, env = "PLUTUS_PAGE_LIMIT", default_value_t = 1000)]
    pub page_limit: u32,

    /// Market segment to fetch
    #[arg(long, env = "PLUTUS_MARKET", default_value = "stocks")]
    pub market: String,

    /// Path of the CSV file records are appended to
    #[arg(long, env = "PLUTUS_SINK_PATH", default_value = "tickers.csv")]
    pub sink_path: PathBuf,

    /// PostgreSQL connection URL (overrides the individual DATABASE_* settings)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_HOST", default_value = "localhost")]
    pub database_host: String,

    #[arg(long, env = "DATABASE_PORT", default_value_t = 5432)]
    pub database_port: u16,

    #[arg(long, env = "DATABASE_USER", default_value = "plutus")]
    pub database_user: String,

    #[arg(long, env = "DATABASE_PASSWORD", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub database_password: String,

    #[arg(long, env = "DATABASE_NAME", default_value = "plutus")]
    pub database_name: String,

    /// Log filter, e.g. `info` or `plutus_core=debug`
    #[arg(long, env = "PLUTUS_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch the catalog once and persist it
    Run,
    /// Run once now, then once a day at a fixed local time until interrupted
    #[command(after_help = "Example: plutus daemon --at 00:00")]
    Daemon {
        /// Local wall-clock time of the daily run (HH:MM)
        #[arg(long, default_value = "00:00", value_parser = parse_time_of_day)]
        at: NaiveTime,
    },
    /// Show store statistics
    Stats,
    /// Validate configuration and check database connectivity
    Check,
}

/// Parses `HH:MM` (or `HH:MM:SS`) into a time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got '{}'", value))
}

impl Config {
    /// The API credential. Fails before anything touches the network.
    pub fn api_key(&self) -> Result<ApiKey, AppError> {
        ApiKey::from_optional(self.api_key.clone())
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.base_url.clone(),
            ..Default::default()
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database_url.clone().filter(|u| !u.trim().is_empty()),
            host: self.database_host.clone(),
            port: self.database_port,
            user: self.database_user.clone(),
            password: self.database_password.clone(),
            database: self.database_name.clone(),
            ..Default::default()
        }
    }

    /// Builds and validates the pipeline configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, AppError> {
        let extra_delay = Duration::try_from_secs_f64(self.extra_delay_secs).map_err(|_| {
            AppError::ConfigError(format!(
                "extra delay must be a non-negative number of seconds, got {}",
                self.extra_delay_secs
            ))
        })?;

        let config = PipelineConfig {
            rate_limit: RateLimitConfig::default()
                .with_calls_per_minute(self.calls_per_minute)
                .with_extra_delay(extra_delay)
                .with_max_attempts(self.max_attempts),
            fetch: FetchConfig {
                query: CatalogQuery {
                    market: self.market.clone(),
                    limit: self.page_limit,
                    ..Default::default()
                },
                max_pages: self.max_pages,
            },
            sink: SinkConfig {
                path: self.sink_path.clone(),
            },
        };
        config.validate()?;
        Ok(config)
    }
}
