//! Historical price retrieval per asset class. Network failures, rate limits
//! and malformed payloads never escape: they are logged and surface as an
//! empty series.

use tracing::{debug, warn};

use crate::config::ProvidersConfig;
use crate::error::{AppError, AppResult};
use crate::model::{AssetClass, PriceSeries};

pub mod crypto;
pub mod equity;
pub mod real_estate;

use crypto::CryptoClient;
use equity::EquityClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub asset: AssetClass,
}

impl HistoryRequest {
    pub fn new(symbol: &str, asset: AssetClass) -> Self {
        Self {
            symbol: symbol.to_string(),
            asset,
        }
    }
}

pub struct HistoricalDataFetcher {
    crypto: CryptoClient,
    equity: EquityClient,
    real_estate_proxies: Vec<String>,
    request_delay: std::time::Duration,
}

impl HistoricalDataFetcher {
    pub fn new(cfg: &ProvidersConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(AppError::Http)?;
        Ok(Self {
            crypto: CryptoClient::new(http.clone(), &cfg.crypto_base_url, cfg.crypto_api_key.clone()),
            equity: EquityClient::new(http, &cfg.equity_base_url),
            real_estate_proxies: cfg.real_estate_proxies.clone(),
            request_delay: cfg.request_delay(),
        })
    }

    /// Up to `days` of daily history. Empty on any provider failure.
    pub async fn get_history(&self, symbol: &str, asset: AssetClass, days: u32) -> PriceSeries {
        let result = match asset {
            AssetClass::Crypto => self.crypto.fetch(symbol, days).await,
            AssetClass::Stock | AssetClass::Etf => self.equity.fetch(symbol, days).await,
            AssetClass::RealEstate => {
                return real_estate::history(&self.equity, &self.real_estate_proxies, symbol, days)
                    .await
            }
        };
        match result {
            Ok(series) => {
                debug!(symbol = %symbol, asset = %asset, points = series.len(), "Fetched history");
                series
            }
            Err(AppError::RateLimited { provider }) => {
                warn!(symbol = %symbol, provider = provider, "Rate limited; returning empty series");
                PriceSeries::empty()
            }
            Err(e) => {
                warn!(symbol = %symbol, asset = %asset, error = %e, "History fetch failed");
                PriceSeries::empty()
            }
        }
    }

    /// Fetch many symbols one after another, pausing between requests to stay
    /// under provider rate limits.
    pub async fn refresh_many(
        &self,
        requests: &[HistoryRequest],
        days: u32,
    ) -> Vec<(HistoryRequest, PriceSeries)> {
        let mut out = Vec::with_capacity(requests.len());
        for (i, req) in requests.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            let series = self.get_history(&req.symbol, req.asset, days).await;
            out.push((req.clone(), series));
        }
        out
    }
}
