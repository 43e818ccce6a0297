//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers for each test.

use chrono::NaiveDate;
use plutus_core::InstrumentRecord;
use plutus_db::InstrumentRepository;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Sets up a PostgreSQL container and returns a repository with the schema applied.
///
/// Each call creates a fresh, isolated database container. The container is
/// automatically cleaned up when the returned `ContainerAsync` is dropped.
///
/// # Returns
///
/// A tuple of (InstrumentRepository, PgPool, ContainerAsync) - keep the container
/// alive for the test duration.
pub async fn setup_test_db() -> (InstrumentRepository, PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once after initdb, so retry until it accepts connections
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    let repo = InstrumentRepository::new(pool.clone());
    repo.ensure_schema()
        .await
        .expect("Failed to create schema");

    (repo, pool, container)
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

/// Creates a fully populated sample record.
pub fn sample_record(ticker: &str, day: u32) -> InstrumentRecord {
    InstrumentRecord {
        ticker: ticker.to_string(),
        name: format!("{} Holdings Inc.", ticker),
        market: "stocks".to_string(),
        locale: "us".to_string(),
        primary_exchange: "XNAS".to_string(),
        instrument_type: "CS".to_string(),
        active: true,
        currency_name: "usd".to_string(),
        cik: "0000320193".to_string(),
        composite_figi: "BBG000B9XRY4".to_string(),
        share_class_figi: "BBG001S5N8V8".to_string(),
        last_updated_utc: "2025-01-01T00:00:00Z".to_string(),
        date_stamp: date(day),
    }
}
