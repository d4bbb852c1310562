use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::model::{PricePoint, PriceSeries};

/// Ticker to CoinGecko coin id. Unknown tickers fall back to their lowercase form.
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("USDC", "usd-coin"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("TRX", "tron"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("LINK", "chainlink"),
    ("LTC", "litecoin"),
    ("BCH", "bitcoin-cash"),
    ("ATOM", "cosmos"),
    ("XLM", "stellar"),
    ("UNI", "uniswap"),
    ("SHIB", "shiba-inu"),
];

pub fn coin_id(symbol: &str) -> String {
    let upper = symbol.trim().to_ascii_uppercase();
    COIN_IDS
        .iter()
        .find(|(ticker, _)| *ticker == upper)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| symbol.trim().to_ascii_lowercase())
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

pub struct CryptoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn fetch(&self, symbol: &str, days: u32) -> AppResult<PriceSeries> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id(symbol));
        let mut req = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("days", days.to_string()),
                ("interval", "daily".to_string()),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited {
                provider: "coingecko",
            });
        }
        let resp = resp.error_for_status()?;
        let body: MarketChartResponse = resp.json().await?;
        Ok(daily_closes(&body.prices).tail(days as usize))
    }
}

/// One point per UTC day, the last sample of that day. CoinGecko can answer
/// with intraday granularity and appends a live sample to daily data.
fn daily_closes(rows: &[(f64, f64)]) -> PriceSeries {
    let mut points: Vec<PricePoint> = Vec::with_capacity(rows.len());
    for (ms, price) in rows {
        let Some(timestamp) = Utc.timestamp_millis_opt(*ms as i64).single() else {
            continue;
        };
        let point = PricePoint {
            timestamp,
            price: *price,
        };
        match points.last_mut() {
            Some(last) if last.timestamp.date_naive() == timestamp.date_naive() => {
                if timestamp > last.timestamp {
                    *last = point;
                }
            }
            _ => points.push(point),
        }
    }
    PriceSeries::from_points(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_coin_ids() {
        assert_eq!(coin_id("btc"), "bitcoin");
        assert_eq!(coin_id("AVAX"), "avalanche-2");
        assert_eq!(coin_id("PEPE"), "pepe");
    }

    #[test]
    fn parses_market_chart_payload() {
        let body: MarketChartResponse = serde_json::from_str(
            r#"{"prices":[[1700000000000,35000.5],[1700086400000,35500.0]],"market_caps":[]}"#,
        )
        .unwrap();
        let series = daily_closes(&body.prices);
        assert_eq!(series.prices(), vec![35000.5, 35500.0]);
    }

    #[test]
    fn hourly_rows_collapse_to_daily_closes() {
        // 2023-11-14T00:00:00Z, hourly for 30 days.
        let start_ms = 1_699_920_000_000.0;
        let rows: Vec<(f64, f64)> = (0..720)
            .map(|i| (start_ms + i as f64 * 3_600_000.0, 100.0 + i as f64))
            .collect();
        let series = daily_closes(&rows);
        assert_eq!(series.len(), 30);
        let dates = series.dates();
        for w in dates.windows(2) {
            assert_eq!(w[1].date_naive() - w[0].date_naive(), chrono::Duration::days(1));
        }
        // Each day keeps its 23:00 sample.
        assert_eq!(series.prices()[0], 123.0);
        assert_eq!(series.last_price(), Some(819.0));
    }

    #[test]
    fn live_sample_replaces_the_same_day_close() {
        let rows = [
            (1_699_920_000_000.0, 10.0),
            (1_700_006_400_000.0, 11.0),
            (1_700_050_000_000.0, 11.5),
        ];
        assert_eq!(daily_closes(&rows).prices(), vec![10.0, 11.5]);
    }
}
