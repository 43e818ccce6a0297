//! Domain models shared by the fetch, normalize and persist stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog entry exactly as the API returned it.
///
/// Field presence and types vary between instruments, so the payload is kept as a
/// JSON object until [`crate::normalize::normalize`] maps it onto [`InstrumentRecord`].
pub type RawRecord = Map<String, Value>;

/// Column order of the flat-file sink and the store table.
pub const FIELD_NAMES: [&str; 13] = [
    "ticker",
    "name",
    "market",
    "locale",
    "primary_exchange",
    "type",
    "active",
    "currency_name",
    "cik",
    "composite_figi",
    "share_class_figi",
    "last_updated_utc",
    "date_stamp",
];

/// One normalized catalog entry.
///
/// Every text field is present (possibly empty) and `date_stamp` is the local date of
/// the run that produced the record, not a value supplied by the API.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use plutus_core::InstrumentRecord;
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let record = InstrumentRecord::empty("BAUG", date);
/// assert_eq!(record.ticker, "BAUG");
/// assert!(!record.active);
/// assert_eq!(record.market, "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub name: String,
    pub market: String,
    pub locale: String,
    pub primary_exchange: String,
    /// Instrument type code (`CS`, `ETF`, `ADRC`, ...). Named `type` on the wire.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub instrument_type: String,
    pub active: bool,
    pub currency_name: String,
    pub cik: String,
    pub composite_figi: String,
    pub share_class_figi: String,
    /// Source timestamp, kept verbatim.
    pub last_updated_utc: String,
    pub date_stamp: NaiveDate,
}

impl InstrumentRecord {
    /// Creates a record with only the key and run date set.
    pub fn empty(ticker: impl Into<String>, date_stamp: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            name: String::new(),
            market: String::new(),
            locale: String::new(),
            primary_exchange: String::new(),
            instrument_type: String::new(),
            active: false,
            currency_name: String::new(),
            cik: String::new(),
            composite_figi: String::new(),
            share_class_figi: String::new(),
            last_updated_utc: String::new(),
            date_stamp,
        }
    }

    /// Renders the record as one sink row, in [`FIELD_NAMES`] order.
    pub fn to_row(&self) -> [String; 13] {
        [
            self.ticker.clone(),
            self.name.clone(),
            self.market.clone(),
            self.locale.clone(),
            self.primary_exchange.clone(),
            self.instrument_type.clone(),
            self.active.to_string(),
            self.currency_name.clone(),
            self.cik.clone(),
            self.composite_figi.clone(),
            self.share_class_figi.clone(),
            self.last_updated_utc.clone(),
            self.date_stamp.format("%Y-%m-%d").to_string(),
        ]
    }
}

/// Aggregated store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_instruments: i64,
    pub active_instruments: i64,
    pub latest_date_stamp: Option<NaiveDate>,
}
