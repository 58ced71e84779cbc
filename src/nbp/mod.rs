//! Client for the NBP (Narodowy Bank Polski) exchange-rate API, table A.
//!
//! Every call is a single request with a fixed timeout. Nothing is retried:
//! one upstream failure is reported as one failure to the caller.

use std::{str::FromStr, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::{debug, error};
use reqwest::{Client, StatusCode, header::ACCEPT};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::exchange_rate::{CurrencyCode, CurrencyInfo, DateRangeQuery, HistoricalPoint, RateQuote};

pub mod xml;

use xml::{ArrayOfExchangeRatesTable, ExchangeRatesSeries, SeriesRate};

pub const DEFAULT_BASE_URL: &str = "https://api.nbp.pl/api";

/// Widest range the upstream answers in one request, both ends inclusive.
pub const MAX_RANGE_DAYS: u64 = 93;

#[async_trait]
pub trait RatesProvider: Send + Sync {
    async fn current_rates(&self) -> Result<Vec<RateQuote>, AppError>;

    async fn historical_rate(
        &self,
        code: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<HistoricalPoint, AppError>;

    /// Points come back in upstream order, which is ascending by date.
    async fn historical_rates(
        &self,
        query: &DateRangeQuery,
    ) -> Result<Vec<HistoricalPoint>, AppError>;

    async fn available_currencies(&self) -> Result<Vec<CurrencyInfo>, AppError> {
        let rates = self.current_rates().await?;
        Ok(rates.iter().map(CurrencyInfo::from).collect())
    }
}

pub struct NbpClient {
    client: Client,
    base_url: String,
}

impl NbpClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nbp-rates/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches and decodes `path`. A 404 from the upstream is `Ok(None)`.
    async fn load_xml<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        let url = format!("{}{}?format=xml", self.base_url, path);
        debug!("NBP API Request: GET {url}");

        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/xml")
            .send()
            .await
            .map_err(|e| {
                error!("NBP API request {url} failed: {e}");
                let reason = if e.is_timeout() {
                    "Request timed out"
                } else {
                    "Connection failed"
                };
                AppError::UpstreamUnavailable(reason.to_string())
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("NBP API has no data for {url}");
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("NBP API answered {status} for {url}: {body}");
            return Err(AppError::UpstreamUnavailable(status.as_u16().to_string()));
        }

        let text = resp.text().await.map_err(|e| {
            error!("Can't read NBP API response for {url}: {e}");
            AppError::UpstreamUnavailable("Connection failed".to_string())
        })?;

        quick_xml::de::from_str(&text).map(Some).map_err(|e| {
            error!("Can't decode NBP API response for {url}: {e}");
            AppError::UpstreamUnavailable("Unexpected response format".to_string())
        })
    }

    async fn load_series(
        &self,
        code: &CurrencyCode,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HistoricalPoint>, AppError> {
        let path = match end {
            Some(end) => format!("/exchangerates/rates/A/{code}/{start}/{end}/"),
            None => format!("/exchangerates/rates/A/{code}/{start}/"),
        };

        let Some(series) = self.load_xml::<ExchangeRatesSeries>(&path).await? else {
            return Ok(Vec::new());
        };

        series.rates.rate.into_iter().map(to_point).collect()
    }
}

#[async_trait]
impl RatesProvider for NbpClient {
    async fn current_rates(&self) -> Result<Vec<RateQuote>, AppError> {
        let tables = self
            .load_xml::<ArrayOfExchangeRatesTable>("/exchangerates/tables/A/")
            .await?;

        let table = tables
            .and_then(|t| t.tables.into_iter().next())
            .filter(|t| !t.rates.rate.is_empty())
            .ok_or_else(|| AppError::UpstreamEmpty("No current rates available".to_string()))?;

        table
            .rates
            .rate
            .into_iter()
            .map(|rate| -> Result<RateQuote, AppError> {
                Ok(RateQuote {
                    mid: parse_mid(&rate.mid)?,
                    code: rate.code,
                    name: rate.currency,
                })
            })
            .collect()
    }

    async fn historical_rate(
        &self,
        code: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<HistoricalPoint, AppError> {
        self.load_series(code, date, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(no_data_for_day(code, date)))
    }

    async fn historical_rates(
        &self,
        query: &DateRangeQuery,
    ) -> Result<Vec<HistoricalPoint>, AppError> {
        let mut points = Vec::new();
        for (from, to) in range_windows(query.start, query.end) {
            points.extend(self.load_series(&query.currency_code, from, Some(to)).await?);
        }

        if points.is_empty() {
            return Err(AppError::NotFound(format!(
                "Currency {} not found or no data available between {} and {}",
                query.currency_code, query.start, query.end
            )));
        }

        Ok(points)
    }
}

fn to_point(rate: SeriesRate) -> Result<HistoricalPoint, AppError> {
    let effective_date = NaiveDate::parse_from_str(&rate.effective_date, "%Y-%m-%d")
        .map_err(|e| {
            error!("Can't parse NBP effective date {}: {e}", rate.effective_date);
            AppError::UpstreamUnavailable("Unexpected response format".to_string())
        })?;

    Ok(HistoricalPoint {
        mid: parse_mid(&rate.mid)?,
        sequence_id: rate.no,
        effective_date,
    })
}

fn parse_mid(s: &str) -> Result<Decimal, AppError> {
    let normalized_string = normalize_decimal_string(s);
    Decimal::from_str(normalized_string.trim()).map_err(|e| {
        error!("Can't parse NBP mid rate {s}: {e}");
        AppError::UpstreamUnavailable("Unexpected response format".to_string())
    })
}

fn normalize_decimal_string(s: &str) -> String {
    s.replace(',', ".")
}

fn no_data_for_day(code: &CurrencyCode, date: NaiveDate) -> String {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => format!(
            "No rate for {code} on {date}: NBP does not publish rates on weekends"
        ),
        _ => format!("Currency {code} not found or no data available for {date}"),
    }
}

/// Splits `[start, end]` into consecutive windows of at most `MAX_RANGE_DAYS`.
fn range_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut from = start;
    loop {
        let to = from
            .checked_add_days(Days::new(MAX_RANGE_DAYS - 1))
            .map_or(end, |d| d.min(end));
        windows.push((from, to));
        if to >= end {
            break;
        }
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }
    windows
}
