//! Instrument repository for PostgreSQL.
//!
//! One table, `tickers`, keyed on `ticker`. Every upsert overwrites all non-key
//! columns, `date_stamp` included, so the table always reflects the latest run that
//! saw an instrument.

use chrono::NaiveDate;
use plutus_core::error::AppError;
use plutus_core::models::{InstrumentRecord, StoreStats};
use plutus_core::traits::InstrumentStore;
use plutus_core::{DbConfig, UpsertOutcome};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Pool, Postgres};

/// Schema statements, executed in order. Additive only: existing tables and rows
/// are never dropped or rewritten.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS tickers (
        ticker VARCHAR(16) PRIMARY KEY,
        name VARCHAR(255) NOT NULL DEFAULT '',
        market VARCHAR(16) NOT NULL DEFAULT '',
        locale VARCHAR(16) NOT NULL DEFAULT '',
        primary_exchange VARCHAR(32) NOT NULL DEFAULT '',
        type VARCHAR(32) NOT NULL DEFAULT '',
        active BOOLEAN NOT NULL DEFAULT FALSE,
        currency_name VARCHAR(16) NOT NULL DEFAULT '',
        cik VARCHAR(32) NOT NULL DEFAULT '',
        composite_figi VARCHAR(32) NOT NULL DEFAULT '',
        share_class_figi VARCHAR(32) NOT NULL DEFAULT '',
        last_updated_utc VARCHAR(32) NOT NULL DEFAULT '',
        date_stamp DATE
    )"#,
    // Tables created before date stamping existed lack the column.
    "ALTER TABLE tickers ADD COLUMN IF NOT EXISTS date_stamp DATE",
    "CREATE INDEX IF NOT EXISTS idx_tickers_date_stamp ON tickers(date_stamp)",
];

/// Column list for SELECT queries. NULLs from rows written by older tooling are
/// read back as the normalized defaults.
const SELECT_COLUMNS: &str = "ticker, \
    COALESCE(name, '') AS name, \
    COALESCE(market, '') AS market, \
    COALESCE(locale, '') AS locale, \
    COALESCE(primary_exchange, '') AS primary_exchange, \
    COALESCE(type, '') AS type, \
    COALESCE(active, FALSE) AS active, \
    COALESCE(currency_name, '') AS currency_name, \
    COALESCE(cik, '') AS cik, \
    COALESCE(composite_figi, '') AS composite_figi, \
    COALESCE(share_class_figi, '') AS share_class_figi, \
    COALESCE(last_updated_utc, '') AS last_updated_utc, \
    COALESCE(date_stamp, DATE '1970-01-01') AS date_stamp";

/// Repository for instrument persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use plutus_db::InstrumentRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/plutus")
///     .await?;
///
/// let repo = InstrumentRepository::new(pool);
/// repo.ensure_schema().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InstrumentRepository {
    pool: Pool<Postgres>,
}

impl InstrumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from configuration.
    ///
    /// A full `url` takes precedence over host/port/user/password/database.
    pub async fn connect(config: &DbConfig) -> Result<Self, AppError> {
        let options = match &config.url {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| AppError::ConfigError(format!("invalid DATABASE_URL: {}", e)))?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.database),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `tickers` table and its index if absent.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;
        }
        tracing::debug!("Store schema ensured");
        Ok(())
    }

    /// Inserts or updates an instrument, reporting which of the two happened.
    pub async fn upsert(&self, record: &InstrumentRecord) -> Result<UpsertOutcome, AppError> {
        let (inserted,): (bool,) = sqlx::query_as(
            r#"
            INSERT INTO tickers (
                ticker,
                name,
                market,
                locale,
                primary_exchange,
                type,
                active,
                currency_name,
                cik,
                composite_figi,
                share_class_figi,
                last_updated_utc,
                date_stamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (ticker)
            DO UPDATE SET
                name = EXCLUDED.name,
                market = EXCLUDED.market,
                locale = EXCLUDED.locale,
                primary_exchange = EXCLUDED.primary_exchange,
                type = EXCLUDED.type,
                active = EXCLUDED.active,
                currency_name = EXCLUDED.currency_name,
                cik = EXCLUDED.cik,
                composite_figi = EXCLUDED.composite_figi,
                share_class_figi = EXCLUDED.share_class_figi,
                last_updated_utc = EXCLUDED.last_updated_utc,
                date_stamp = EXCLUDED.date_stamp
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.ticker)
        .bind(&record.name)
        .bind(&record.market)
        .bind(&record.locale)
        .bind(&record.primary_exchange)
        .bind(&record.instrument_type)
        .bind(record.active)
        .bind(&record.currency_name)
        .bind(&record.cik)
        .bind(&record.composite_figi)
        .bind(&record.share_class_figi)
        .bind(&record.last_updated_utc)
        .bind(record.date_stamp)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Retrieves an instrument by ticker.
    pub async fn get(&self, ticker: &str) -> Result<Option<InstrumentRecord>, AppError> {
        let query = format!("SELECT {} FROM tickers WHERE ticker = $1", SELECT_COLUMNS);
        sqlx::query_as::<_, InstrumentRecord>(&query)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Lists instruments stamped with the given run date, ordered by ticker.
    pub async fn list_by_date(
        &self,
        date_stamp: NaiveDate,
    ) -> Result<Vec<InstrumentRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM tickers WHERE date_stamp = $1 ORDER BY ticker",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, InstrumentRecord>(&query)
            .bind(date_stamp)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Checks database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    /// Returns aggregate statistics about stored instruments.
    ///
    /// A database without the `tickers` table reports an empty store.
    pub async fn get_stats(&self) -> Result<StoreStats, AppError> {
        let result: Result<StatsRow, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE active) as active,
                MAX(date_stamp) as latest_date_stamp
            FROM tickers
            "#,
        )
        .fetch_one(&self.pool)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if is_undefined_table(&e) => {
                tracing::debug!("tickers table does not exist yet");
                return Ok(StoreStats {
                    total_instruments: 0,
                    active_instruments: 0,
                    latest_date_stamp: None,
                });
            }
            Err(e) => return Err(AppError::DatabaseError(e)),
        };

        Ok(StoreStats {
            total_instruments: row.total.unwrap_or(0),
            active_instruments: row.active.unwrap_or(0),
            latest_date_stamp: row.latest_date_stamp,
        })
    }
}

/// Postgres SQLSTATE 42P01 (undefined_table).
fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("42P01"),
        _ => false,
    }
}

/// Helper struct for deserializing stats query results
#[derive(sqlx::FromRow)]
struct StatsRow {
    total: Option<i64>,
    active: Option<i64>,
    latest_date_stamp: Option<NaiveDate>,
}

// =============================================================================
// Trait Implementation: InstrumentStore
// =============================================================================

impl InstrumentStore for InstrumentRepository {
    async fn ensure_schema(&self) -> Result<(), AppError> {
        InstrumentRepository::ensure_schema(self).await
    }

    async fn upsert(&self, record: &InstrumentRecord) -> Result<UpsertOutcome, AppError> {
        InstrumentRepository::upsert(self, record).await
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        InstrumentRepository::get_stats(self).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        InstrumentRepository::health_check(self).await
    }
}
