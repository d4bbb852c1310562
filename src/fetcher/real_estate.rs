use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};

use crate::cache::fnv1a;
use crate::model::{PricePoint, PriceSeries};

use super::equity::EquityClient;

/// A proxy is accepted once it returns at least this many points.
pub const MIN_PROXY_POINTS: usize = 5;

const ANNUAL_DRIFT: f64 = 0.03;
const ANNUAL_VOL: f64 = 0.04;
const BASE_PRICE: f64 = 100.0;

/// Try each proxy ETF in order; synthesize a random walk when none delivers.
pub async fn history(
    equity: &EquityClient,
    proxies: &[String],
    symbol: &str,
    days: u32,
) -> PriceSeries {
    for proxy in proxies {
        match equity.fetch(proxy, days).await {
            Ok(series) if series.len() >= MIN_PROXY_POINTS => {
                info!(symbol = %symbol, proxy = %proxy, points = series.len(), "Using real estate proxy");
                return series;
            }
            Ok(series) => {
                warn!(symbol = %symbol, proxy = %proxy, points = series.len(), "Proxy returned too few points")
            }
            Err(e) => warn!(symbol = %symbol, proxy = %proxy, error = %e, "Proxy fetch failed"),
        }
    }
    info!(symbol = %symbol, "All real estate proxies failed; synthesizing series");
    synthetic(symbol, days, Utc::now())
}

/// Geometric random walk with fixed annual drift and volatility, seeded from
/// the symbol so repeated requests agree. The last point falls on `end`.
pub fn synthetic(symbol: &str, days: u32, end: DateTime<Utc>) -> PriceSeries {
    let seed = fnv1a(symbol.trim().to_ascii_uppercase().as_bytes());
    let mut rng = StdRng::seed_from_u64(seed);
    let dt = 1.0 / 365.0;
    let mu = (ANNUAL_DRIFT - 0.5 * ANNUAL_VOL * ANNUAL_VOL) * dt;
    let sd = ANNUAL_VOL * dt.sqrt();
    let log_step = match Normal::new(mu, sd) {
        Ok(dist) => dist,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "Invalid walk parameters");
            return PriceSeries::empty();
        }
    };

    let n = days.max(1) as i64;
    let mut price = BASE_PRICE;
    let mut points = Vec::with_capacity(n as usize);
    for i in 0..n {
        if i > 0 {
            price *= log_step.sample(&mut rng).exp();
        }
        points.push(PricePoint {
            timestamp: end - Duration::days(n - 1 - i),
            price,
        });
    }
    PriceSeries::from_points(points)
}
