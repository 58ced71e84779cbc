use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Three-letter ISO 4217 code, already validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub(crate) fn new_unchecked(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the current table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub code: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub mid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
}

impl From<&RateQuote> for CurrencyInfo {
    fn from(quote: &RateQuote) -> Self {
        Self {
            code: quote.code.clone(),
            name: quote.name.clone(),
        }
    }
}

/// A published mid rate on a given day. `sequence_id` is the upstream table
/// number, e.g. `001/A/NBP/2024`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    pub sequence_id: String,
    pub effective_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub mid: Decimal,
}

/// A validated series request: `start < end`, neither in the future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRangeQuery {
    pub currency_code: CurrencyCode,
    pub start: NaiveDate,
    pub end: NaiveDate,
}
