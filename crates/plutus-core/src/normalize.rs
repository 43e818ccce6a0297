//! Mapping of raw API records onto [`InstrumentRecord`].
//!
//! [`normalize`] guarantees structural completeness only: every field is present and
//! typed, missing values become `""` or `false`. Content is not validated.
//! [`normalize_batch`] additionally enforces the per-run key invariants (non-empty,
//! unique `ticker`) before anything is persisted.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{InstrumentRecord, RawRecord};

/// Maps one raw record to the fixed schema, stamping it with `run_date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use plutus_core::normalize::normalize;
///
/// let raw = serde_json::json!({"ticker": "BAUG", "name": "Test ETF"});
/// let raw = raw.as_object().unwrap();
/// let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
///
/// let record = normalize(raw, date);
/// assert_eq!(record.name, "Test ETF");
/// assert_eq!(record.market, "");
/// assert!(!record.active);
/// assert_eq!(record.date_stamp.to_string(), "2025-01-01");
/// ```
pub fn normalize(raw: &RawRecord, run_date: NaiveDate) -> InstrumentRecord {
    InstrumentRecord {
        ticker: text(raw, "ticker"),
        name: text(raw, "name"),
        market: text(raw, "market"),
        locale: text(raw, "locale"),
        primary_exchange: text(raw, "primary_exchange"),
        instrument_type: text(raw, "type"),
        active: flag(raw, "active"),
        currency_name: text(raw, "currency_name"),
        cik: text(raw, "cik"),
        composite_figi: text(raw, "composite_figi"),
        share_class_figi: text(raw, "share_class_figi"),
        last_updated_utc: text(raw, "last_updated_utc"),
        date_stamp: run_date,
    }
}

fn text(raw: &RawRecord, key: &str) -> String {
    match raw.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn flag(raw: &RawRecord, key: &str) -> bool {
    match raw.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        _ => false,
    }
}

/// Result of normalizing one run's worth of raw records.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Records in first-seen order, one per ticker.
    pub records: Vec<InstrumentRecord>,
    /// Raw records without a usable ticker.
    pub dropped: usize,
    /// Raw records whose ticker was already seen earlier in the run.
    pub duplicates: usize,
}

/// Normalizes a whole run, dropping keyless records and collapsing duplicate tickers.
///
/// A ticker seen more than once keeps its first position and the values of its last
/// occurrence, matching what a sequence of upserts would leave in the store.
pub fn normalize_batch(raws: &[RawRecord], run_date: NaiveDate) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(raws.len());

    for raw in raws {
        let record = normalize(raw, run_date);
        if record.ticker.trim().is_empty() {
            batch.dropped += 1;
            continue;
        }
        match positions.get(&record.ticker) {
            Some(&idx) => {
                batch.duplicates += 1;
                batch.records[idx] = record;
            }
            None => {
                positions.insert(record.ticker.clone(), batch.records.len());
                batch.records.push(record);
            }
        }
    }

    if batch.dropped > 0 || batch.duplicates > 0 {
        tracing::debug!(
            dropped = batch.dropped,
            duplicates = batch.duplicates,
            "Collapsed raw records"
        );
    }

    batch
}
