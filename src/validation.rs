//! Input checks run before any upstream call or file write. All functions are
//! pure apart from reading the clock in the `today`-less variants.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationError;
use crate::exchange_rate::{CurrencyCode, DateRangeQuery};

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"));

static CSV_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.csv$").expect("valid filename regex"));

/// Body of `POST /api/currency/export-csv`. Fields are optional here so that
/// a missing one is reported by the validator rather than the JSON decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExportRequest {
    pub currency_code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExportJob {
    pub range: DateRangeQuery,
    pub filename: Option<String>,
}

/// NBP publishes by the Warsaw calendar. Central European standard time is
/// used all year, so during summer time the day rolls over an hour late.
fn warsaw_date(now: DateTime<Utc>) -> NaiveDate {
    (now + TimeDelta::hours(1)).date_naive()
}

fn today() -> NaiveDate {
    warsaw_date(Utc::now())
}

pub fn validate_date(s: &str) -> Result<NaiveDate, ValidationError> {
    validate_date_on(s, today())
}

/// Weekends pass: the upstream simply has no table for them.
pub fn validate_date_on(s: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if !DATE_SHAPE.is_match(s) {
        return Err(ValidationError::DateFormat);
    }
    let date =
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate)?;
    if date > today {
        return Err(ValidationError::FutureDate);
    }
    Ok(date)
}

pub fn validate_currency_code(s: &str) -> Result<CurrencyCode, ValidationError> {
    if s.chars().count() != 3 {
        return Err(ValidationError::CodeLength);
    }
    if !s.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::CodeCharacters);
    }
    Ok(CurrencyCode::new_unchecked(s.to_string()))
}

pub fn validate_date_range(
    code: &str,
    start: &str,
    end: &str,
) -> Result<DateRangeQuery, ValidationError> {
    validate_date_range_on(code, start, end, today())
}

pub fn validate_date_range_on(
    code: &str,
    start: &str,
    end: &str,
    today: NaiveDate,
) -> Result<DateRangeQuery, ValidationError> {
    let currency_code = validate_currency_code(code)?;
    let start = validate_date_on(start, today)?;
    let end = validate_date_on(end, today)?;
    if start >= end {
        return Err(ValidationError::RangeOrder);
    }
    Ok(DateRangeQuery {
        currency_code,
        start,
        end,
    })
}

pub fn validate_filename(s: &str) -> Result<&str, ValidationError> {
    if CSV_FILENAME.is_match(s) {
        Ok(s)
    } else {
        Err(ValidationError::Filename)
    }
}

pub fn validate_csv_export_request(
    body: &CsvExportRequest,
) -> Result<CsvExportJob, ValidationError> {
    validate_csv_export_request_on(body, today())
}

pub fn validate_csv_export_request_on(
    body: &CsvExportRequest,
    today: NaiveDate,
) -> Result<CsvExportJob, ValidationError> {
    let code = body
        .currency_code
        .as_deref()
        .ok_or(ValidationError::Missing("currencyCode"))?;
    let start = body
        .start_date
        .as_deref()
        .ok_or(ValidationError::Missing("startDate"))?;
    let end = body
        .end_date
        .as_deref()
        .ok_or(ValidationError::Missing("endDate"))?;

    let range = validate_date_range_on(code, start, end, today)?;
    let filename = body
        .filename
        .as_deref()
        .map(validate_filename)
        .transpose()?
        .map(str::to_string);

    Ok(CsvExportJob { range, filename })
}
