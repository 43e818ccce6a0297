//! Integration tests for InstrumentRepository.
//!
//! These tests verify the repository layer against a real PostgreSQL database.
//! Each test runs in an isolated container.

use plutus_core::traits::InstrumentStore;
use plutus_core::{InstrumentRecord, UpsertOutcome};

use crate::integration::common::{date, sample_record, setup_test_db};

/// Test 1: Verify successful insertion of a new instrument
#[tokio::test]
async fn test_upsert_inserts_new_instrument() {
    let (repo, _pool, _container) = setup_test_db().await;

    let record = sample_record("AAPL", 1);
    let outcome = repo.upsert(&record).await.expect("upsert should succeed");

    assert_eq!(outcome, UpsertOutcome::Created);
    let stored = repo
        .get("AAPL")
        .await
        .expect("get should succeed")
        .expect("instrument should exist");
    assert_eq!(stored, record);
}

/// Test 2: Upserting the same ticker twice leaves one row with the latest values
#[tokio::test]
async fn test_upsert_same_ticker_keeps_latest_values() {
    let (repo, pool, _container) = setup_test_db().await;

    repo.upsert(&sample_record("AAPL", 1)).await.unwrap();

    let mut renamed = sample_record("AAPL", 2);
    renamed.name = "Apple Inc.".to_string();
    renamed.active = false;
    let outcome = repo.upsert(&renamed).await.unwrap();

    assert_eq!(outcome, UpsertOutcome::Updated);
    let stored = repo.get("AAPL").await.unwrap().unwrap();
    assert_eq!(stored.name, "Apple Inc.");
    assert!(!stored.active);
    assert_eq!(stored.date_stamp, date(2));

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickers WHERE ticker = 'AAPL'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

/// Test 3: Re-upserting identical data only moves the date stamp
#[tokio::test]
async fn test_upsert_identical_data_only_changes_date_stamp() {
    let (repo, _pool, _container) = setup_test_db().await;

    repo.upsert(&sample_record("MSFT", 1)).await.unwrap();
    let before = repo.get("MSFT").await.unwrap().unwrap();
    repo.upsert(&sample_record("MSFT", 3)).await.unwrap();
    let after = repo.get("MSFT").await.unwrap().unwrap();

    assert_eq!(after.date_stamp, date(3));
    assert_eq!(
        InstrumentRecord {
            date_stamp: before.date_stamp,
            ..after
        },
        before
    );
}

/// Test 4: Empty defaults round-trip through the store
#[tokio::test]
async fn test_upsert_sparse_record() {
    let (repo, _pool, _container) = setup_test_db().await;

    let sparse = InstrumentRecord::empty("BAUG", date(1));
    repo.upsert(&sparse).await.unwrap();

    assert_eq!(repo.get("BAUG").await.unwrap().unwrap(), sparse);
}

/// Test 5: A value exceeding the column width fails only that record
#[tokio::test]
async fn test_oversized_value_fails_single_upsert() {
    let (repo, _pool, _container) = setup_test_db().await;

    let mut oversized = sample_record("TOOLONG", 1);
    oversized.market = "x".repeat(64);

    let result = repo.upsert(&oversized).await;
    assert!(result.is_err());

    repo.upsert(&sample_record("OK", 1))
        .await
        .expect("later upserts should still succeed");
    assert!(repo.get("TOOLONG").await.unwrap().is_none());
}

/// Test 6: ensure_schema is idempotent and keeps existing rows
#[tokio::test]
async fn test_ensure_schema_keeps_rows() {
    let (repo, _pool, _container) = setup_test_db().await;

    repo.upsert(&sample_record("AAPL", 1)).await.unwrap();
    repo.ensure_schema().await.expect("second ensure_schema");

    assert!(repo.get("AAPL").await.unwrap().is_some());
}

/// Test 7: Rows written by older tooling with NULL columns read back as defaults
#[tokio::test]
async fn test_get_reads_null_columns_as_defaults() {
    let (repo, pool, _container) = setup_test_db().await;

    sqlx::query("ALTER TABLE tickers ALTER COLUMN name DROP NOT NULL")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO tickers (ticker, name, date_stamp) VALUES ('OLD', NULL, '2024-12-31')")
        .execute(&pool)
        .await
        .unwrap();

    let stored = repo.get("OLD").await.unwrap().unwrap();
    assert_eq!(stored.name, "");
    assert_eq!(stored.market, "");
}

/// Test 8: Statistics over stored instruments
#[tokio::test]
async fn test_stats() {
    let (repo, _pool, _container) = setup_test_db().await;

    let empty = InstrumentStore::stats(&repo).await.unwrap();
    assert_eq!(empty.total_instruments, 0);
    assert_eq!(empty.latest_date_stamp, None);

    repo.upsert(&sample_record("A", 1)).await.unwrap();
    repo.upsert(&sample_record("B", 2)).await.unwrap();
    let mut inactive = sample_record("C", 2);
    inactive.active = false;
    repo.upsert(&inactive).await.unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_instruments, 3);
    assert_eq!(stats.active_instruments, 2);
    assert_eq!(stats.latest_date_stamp, Some(date(2)));

    let listed = repo.list_by_date(date(2)).await.unwrap();
    let tickers: Vec<&str> = listed.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["B", "C"]);
}

/// Test 9: Health check succeeds on a live database
#[tokio::test]
async fn test_health_check() {
    let (repo, _pool, _container) = setup_test_db().await;
    repo.health_check().await.expect("health check should pass");
}

/// Test 10: Statistics on a database without the table report an empty store
#[tokio::test]
async fn test_stats_without_schema() {
    let (repo, pool, _container) = setup_test_db().await;
    sqlx::query("DROP TABLE tickers")
        .execute(&pool)
        .await
        .unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_instruments, 0);
    assert_eq!(stats.active_instruments, 0);
    assert_eq!(stats.latest_date_stamp, None);
}
