use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::model::{PricePoint, PriceSeries};

/// Smallest Yahoo range bucket covering `days`.
pub fn range_for_days(days: u32) -> &'static str {
    match days {
        0..=5 => "5d",
        6..=30 => "1mo",
        31..=90 => "3mo",
        91..=180 => "6mo",
        181..=365 => "1y",
        366..=730 => "2y",
        _ => "5y",
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

pub struct EquityClient {
    http: reqwest::Client,
    base_url: String,
}

impl EquityClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Daily closes for the last `days` sessions at most.
    pub async fn fetch(&self, symbol: &str, days: u32) -> AppResult<PriceSeries> {
        let url = format!("{}/{}", self.base_url, symbol.trim().to_ascii_uppercase());
        let resp = self
            .http
            .get(&url)
            .query(&[("range", range_for_days(days)), ("interval", "1d")])
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited { provider: "yahoo" });
        }
        let body: ChartResponse = resp.error_for_status()?.json().await?;
        let series = parse_chart(body)?;
        Ok(series.tail(days as usize))
    }
}

fn parse_chart(body: ChartResponse) -> AppResult<PriceSeries> {
    if let Some(err) = body.chart.error {
        return Err(AppError::Provider {
            provider: "yahoo",
            reason: format!("chart error {}: {}", err.code, err.description),
        });
    }
    let Some(data) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::empty());
    };
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();
    let n = data.timestamp.len().min(closes.len());
    if data.timestamp.len() != closes.len() {
        tracing::debug!(
            timestamps = data.timestamp.len(),
            closes = closes.len(),
            "Truncating mismatched chart arrays"
        );
    }
    Ok(PriceSeries::from_points(
        data.timestamp[..n]
            .iter()
            .zip(&closes[..n])
            .filter_map(|(ts, close)| {
                Some(PricePoint {
                    timestamp: Utc.timestamp_opt(*ts, 0).single()?,
                    price: (*close)?,
                })
            }),
    ))
}
