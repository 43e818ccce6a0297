//! Integration tests for IngestPipeline and SinkWriter.
//!
//! The pipeline runs against the in-memory mocks and writes its file sink into a
//! temporary directory. The clock is paused so pacing is free.

use std::fs;

use chrono::NaiveDate;
use plutus_core::{
    AppError, CatalogPage, FileSink, IngestPipeline, InstrumentRecord, RawRecord,
    SilentReporter, SinkWriter,
};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MockCatalogClient, MockInstrumentStore, MockResponse, page_of, pipeline_config, raw,
};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// A sparse record reaches both sinks with every column present.
#[tokio::test(start_paused = true)]
async fn test_run_writes_sparse_record_to_both_sinks() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let sparse = json!({"ticker": "BAUG", "name": "Test ETF"})
        .as_object()
        .cloned()
        .unwrap();
    let client = MockCatalogClient::with_pages(vec![vec![sparse]]);
    let store = MockInstrumentStore::new();
    let config = pipeline_config(dir.path());
    let sink_path = config.sink.path.clone();
    let pipeline = IngestPipeline::new(client, store.clone(), config);

    // Act
    let summary = pipeline.run_once_on(date(1)).await.unwrap();

    // Assert
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.persist.written, 1);
    assert_eq!(summary.persist.created, 1);
    assert!(summary.is_clean());

    let lines = read_lines(&sink_path);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ticker,name,market"));
    assert_eq!(lines[1], "BAUG,Test ETF,,,,,false,,,,,,2025-01-01");

    let stored = store.get("BAUG").unwrap();
    assert_eq!(stored.name, "Test ETF");
    assert_eq!(stored.market, "");
    assert!(!stored.active);
    assert_eq!(stored.date_stamp, date(1));
}

/// Every record of a run carries the same date stamp.
#[tokio::test(start_paused = true)]
async fn test_run_stamps_every_record_with_run_date() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::with_pages(vec![
        page_of("A", 20, None).results,
        page_of("B", 20, None).results,
    ]);
    let store = MockInstrumentStore::new();
    let pipeline = IngestPipeline::new(client, store.clone(), pipeline_config(dir.path()));

    let summary = pipeline.run_once_on(date(7)).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(store.len(), 40);
    for i in 0..20 {
        assert_eq!(store.get(&format!("A{i}")).unwrap().date_stamp, date(7));
        assert_eq!(store.get(&format!("B{i}")).unwrap().date_stamp, date(7));
    }
}

/// One failing upsert does not stop the rest of the batch.
#[tokio::test(start_paused = true)]
async fn test_single_store_failure_is_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::with_pages(vec![page_of("T", 100, None).results]);
    let store = MockInstrumentStore::new().fail_on("T49");
    let config = pipeline_config(dir.path());
    let sink_path = config.sink.path.clone();
    let pipeline = IngestPipeline::new(client, store.clone(), config);

    let summary = pipeline.run_once_on(date(1)).await.unwrap();

    assert_eq!(summary.persist.written, 100);
    assert_eq!(summary.persist.upserted(), 99);
    assert_eq!(summary.persist.failed, 1);
    assert_eq!(summary.persist.failed_tickers, vec!["T49".to_string()]);
    assert!(!summary.is_clean());
    assert_eq!(store.len(), 99);
    assert!(store.get("T49").is_none());
    assert!(store.get("T50").is_some());
    assert_eq!(read_lines(&sink_path).len(), 101);
}

/// A fetch that runs out of attempts aborts before either sink is touched.
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_write_nothing() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::new(vec![
        MockResponse::Throttled,
        MockResponse::Throttled,
        MockResponse::Throttled,
    ]);
    let store = MockInstrumentStore::new();
    let config = pipeline_config(dir.path());
    let sink_path = config.sink.path.clone();
    let pipeline = IngestPipeline::new(client, store.clone(), config);

    let err = pipeline.run_once_on(date(1)).await.unwrap_err();

    assert!(matches!(err, AppError::ExhaustedRetries { attempts: 3, .. }));
    assert!(!sink_path.exists());
    assert_eq!(store.upsert_calls(), 0);
}

/// A second run appends below the first without repeating the header and
/// overwrites store rows with the newer values.
#[tokio::test(start_paused = true)]
async fn test_second_run_appends_and_overwrites() {
    let dir = TempDir::new().unwrap();
    let mut renamed = raw("AAPL", "Apple Inc.");
    renamed.insert("active".to_string(), json!(false));
    let client = MockCatalogClient::new(vec![
        MockResponse::Page(page_of_records(vec![raw("AAPL", "Apple"), raw("MSFT", "Microsoft")])),
        MockResponse::Page(page_of_records(vec![renamed])),
    ]);
    let store = MockInstrumentStore::new();
    let config = pipeline_config(dir.path());
    let sink_path = config.sink.path.clone();
    let pipeline = IngestPipeline::new(client, store.clone(), config);

    let first = pipeline.run_once_on(date(1)).await.unwrap();
    let second = pipeline.run_once_on(date(2)).await.unwrap();

    assert_eq!(first.persist.created, 2);
    assert_eq!(second.persist.updated, 1);
    assert_eq!(second.persist.created, 0);

    let lines = read_lines(&sink_path);
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("ticker,")).count(),
        1
    );
    assert!(lines[3].starts_with("AAPL,Apple Inc.,"));

    let aapl = store.get("AAPL").unwrap();
    assert_eq!(aapl.name, "Apple Inc.");
    assert!(!aapl.active);
    assert_eq!(aapl.date_stamp, date(2));
    assert_eq!(store.get("MSFT").unwrap().date_stamp, date(1));
}

/// Re-ingesting unchanged data only moves the date stamp.
#[tokio::test(start_paused = true)]
async fn test_rerun_with_identical_data_only_changes_date() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::new(vec![
        MockResponse::Page(page_of("X", 3, None)),
        MockResponse::Page(page_of("X", 3, None)),
    ]);
    let store = MockInstrumentStore::new();
    let pipeline = IngestPipeline::new(client, store.clone(), pipeline_config(dir.path()));

    pipeline.run_once_on(date(1)).await.unwrap();
    let before = store.get("X1").unwrap();
    pipeline.run_once_on(date(2)).await.unwrap();
    let after = store.get("X1").unwrap();

    assert_eq!(after.date_stamp, date(2));
    assert_eq!(
        InstrumentRecord {
            date_stamp: before.date_stamp,
            ..after
        },
        before
    );
    assert_eq!(store.len(), 3);
}

/// Records without a ticker are dropped; repeated tickers collapse to one row.
#[tokio::test(start_paused = true)]
async fn test_run_drops_blank_tickers_and_collapses_duplicates() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::with_pages(vec![
        vec![raw("A", "first"), raw("", "nameless"), raw("B", "b")],
        vec![raw("A", "second"), raw("   ", "blank")],
    ]);
    let store = MockInstrumentStore::new();
    let pipeline = IngestPipeline::new(client, store.clone(), pipeline_config(dir.path()));

    let summary = pipeline.run_once_on(date(1)).await.unwrap();

    assert_eq!(summary.fetched, 5);
    assert_eq!(summary.dropped, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.normalized, 2);
    assert_eq!(store.upsert_calls(), 2);
    assert_eq!(store.get("A").unwrap().name, "second");
}

/// Pacing carries across runs of the same pipeline.
#[tokio::test(start_paused = true)]
async fn test_limiter_state_survives_between_runs() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::new(vec![
        MockResponse::Page(page_of("A", 1, None)),
        MockResponse::Page(page_of("B", 1, None)),
    ]);
    let pipeline = IngestPipeline::new(
        client.clone(),
        MockInstrumentStore::new(),
        pipeline_config(dir.path()),
    );

    pipeline.run_once_on(date(1)).await.unwrap();
    let first_call = pipeline.limiter().last_call().unwrap();
    pipeline.run_once_on(date(2)).await.unwrap();
    let second_call = pipeline.limiter().last_call().unwrap();

    assert_eq!(client.request_count(), 2);
    assert!(second_call.duration_since(first_call) >= pipeline.limiter().min_interval());
}

/// A run cancelled before it starts issues no request and writes nothing.
#[tokio::test(start_paused = true)]
async fn test_cancelled_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::endless(5);
    let store = MockInstrumentStore::new();
    let config = pipeline_config(dir.path());
    let sink_path = config.sink.path.clone();
    let pipeline = IngestPipeline::new(client.clone(), store.clone(), config);

    let token = CancellationToken::new();
    token.cancel();
    let result = pipeline
        .run_once_cancellable(date(1), &SilentReporter, token)
        .await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(client.request_count(), 0);
    assert!(!sink_path.exists());
    assert!(store.is_empty());
}

/// If the file sink cannot be written the store is left alone.
#[tokio::test(start_paused = true)]
async fn test_file_sink_failure_skips_store() {
    let dir = TempDir::new().unwrap();
    let client = MockCatalogClient::with_pages(vec![page_of("T", 3, None).results]);
    let store = MockInstrumentStore::new();
    let mut config = pipeline_config(dir.path());
    config.sink.path = dir.path().to_path_buf();
    let pipeline = IngestPipeline::new(client, store.clone(), config);

    let err = pipeline.run_once_on(date(1)).await.unwrap_err();

    assert!(matches!(err, AppError::SinkError(_)));
    assert_eq!(store.upsert_calls(), 0);
}

#[tokio::test]
async fn test_sink_writer_counts_outcomes() {
    let dir = TempDir::new().unwrap();
    let store = MockInstrumentStore::new().fail_on("BAD");
    let writer = SinkWriter::new(FileSink::new(dir.path().join("out.csv")), store.clone());

    let records = vec![
        InstrumentRecord::empty("A", date(1)),
        InstrumentRecord::empty("BAD", date(1)),
        InstrumentRecord::empty("A", date(2)),
    ];
    let stats = writer.persist(&records).await.unwrap();

    assert_eq!(stats.written, 3);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 3);
    assert_eq!(store.get("A").unwrap().date_stamp, date(2));
}

fn page_of_records(results: Vec<RawRecord>) -> CatalogPage {
    CatalogPage {
        results,
        next_url: None,
    }
}

