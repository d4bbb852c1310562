use chrono::Utc;
use tracing::debug;

use crate::capabilities::{Capabilities, CAPABILITIES};
#[cfg(feature = "isolation-forest")]
use crate::model::series::log_returns;
use crate::model::series::{mean_std, simple_returns};
use crate::model::{Anomaly, AnomalyType, AssetClass, DetectionMethod, PriceSeries, Severity};

#[cfg(feature = "isolation-forest")]
use super::isolation_forest::IsolationForest;

pub const ISOLATION_MIN_POINTS: usize = 30;
pub const ZSCORE_MIN_POINTS: usize = 10;
pub const ZSCORE_THRESHOLD_CRYPTO: f64 = 2.5;
pub const ZSCORE_THRESHOLD_OTHER: f64 = 3.0;
pub const DEVIATION_THRESHOLD_CRYPTO: f64 = 20.0;
pub const DEVIATION_THRESHOLD_OTHER: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    caps: Capabilities,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(CAPABILITIES)
    }
}

impl AnomalyDetector {
    pub fn new(caps: Capabilities) -> Self {
        Self { caps }
    }

    /// Run the isolation forest, z-score and threshold stages in order and
    /// report the first positive result. `history` holds closes before the
    /// live `current_price`. Always returns a record; `is_anomaly` is false
    /// when no stage fires.
    pub fn detect(
        &self,
        symbol: &str,
        asset: AssetClass,
        history: &PriceSeries,
        current_price: f64,
        avg_buy_price: f64,
    ) -> Anomaly {
        if history.is_empty() || !current_price.is_finite() || current_price <= 0.0 {
            return Anomaly::none(symbol);
        }
        let prices = history.prices();
        if self.caps.isolation_forest {
            if let Some(a) = isolation_forest_detect(symbol, &prices, current_price) {
                return a;
            }
        }
        if let Some(a) = zscore_detect(symbol, &prices, current_price, asset) {
            return a;
        }
        if let Some(a) = threshold_detect(symbol, current_price, avg_buy_price, asset) {
            return a;
        }
        debug!(symbol = %symbol, "No anomaly detected");
        Anomaly::none(symbol)
    }
}

/// Isolation forest on historical log returns, scoring the live return.
#[cfg(feature = "isolation-forest")]
pub fn isolation_forest_detect(symbol: &str, history: &[f64], current_price: f64) -> Option<Anomaly> {
    if history.len() < ISOLATION_MIN_POINTS {
        return None;
    }
    let last = *history.last()?;
    if last <= 0.0 || current_price <= 0.0 {
        return None;
    }
    let returns = log_returns(history);
    let forest = IsolationForest::fit(&returns)?;
    let live = (current_price / last).ln();
    let score = forest.decision_function(live);
    if score >= 0.0 {
        return None;
    }
    let severity = if score < -0.3 {
        Severity::High
    } else if score < -0.15 {
        Severity::Medium
    } else {
        Severity::Low
    };
    let change = (current_price - last) / last * 100.0;
    let (mean, std) = mean_std(&returns);
    let z = if std > 0.0 { (live - mean) / std } else { 0.0 };
    Some(Anomaly {
        symbol: symbol.to_string(),
        is_anomaly: true,
        anomaly_type: AnomalyType::from_change(change),
        severity,
        description: format!(
            "{} moved {:+.2}% from the previous close, an isolation forest outlier ({:.2} standard deviations)",
            symbol, change, z
        ),
        detected_at: Utc::now(),
        price_change_percent: change,
        z_score: z,
        method: Some(DetectionMethod::IsolationForest),
    })
}

#[cfg(not(feature = "isolation-forest"))]
pub fn isolation_forest_detect(_symbol: &str, _history: &[f64], _current_price: f64) -> Option<Anomaly> {
    None
}

/// Z-score of the live simple return against historical simple returns.
/// A constant history has no spread and never fires.
pub fn zscore_detect(
    symbol: &str,
    history: &[f64],
    current_price: f64,
    asset: AssetClass,
) -> Option<Anomaly> {
    if history.len() < ZSCORE_MIN_POINTS {
        return None;
    }
    let last = *history.last()?;
    if last <= 0.0 {
        return None;
    }
    let (mean, std) = mean_std(&simple_returns(history));
    if std.is_nan() || std <= f64::EPSILON {
        return None;
    }
    let live = (current_price - last) / last;
    let z = (live - mean) / std;
    let threshold = if asset.is_crypto() {
        ZSCORE_THRESHOLD_CRYPTO
    } else {
        ZSCORE_THRESHOLD_OTHER
    };
    if z.abs() <= threshold {
        return None;
    }
    let ratio = z.abs() / threshold;
    let severity = if ratio > 1.5 {
        Severity::High
    } else if ratio > 1.2 {
        Severity::Medium
    } else {
        Severity::Low
    };
    let change = live * 100.0;
    Some(Anomaly {
        symbol: symbol.to_string(),
        is_anomaly: true,
        anomaly_type: AnomalyType::from_change(change),
        severity,
        description: format!(
            "{} moved {:+.2}% from the previous close ({:.2} standard deviations)",
            symbol, change, z
        ),
        detected_at: Utc::now(),
        price_change_percent: change,
        z_score: z,
        method: Some(DetectionMethod::ZScore),
    })
}

/// Deviation of the current price from the holder's average buy price.
pub fn threshold_detect(
    symbol: &str,
    current_price: f64,
    avg_buy_price: f64,
    asset: AssetClass,
) -> Option<Anomaly> {
    if avg_buy_price.is_nan() || avg_buy_price <= 0.0 || !current_price.is_finite() {
        return None;
    }
    let change = (current_price - avg_buy_price) / avg_buy_price * 100.0;
    let threshold = if asset.is_crypto() {
        DEVIATION_THRESHOLD_CRYPTO
    } else {
        DEVIATION_THRESHOLD_OTHER
    };
    if change.abs() <= threshold {
        return None;
    }
    let severity = if change.abs() > 2.0 * threshold {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Anomaly {
        symbol: symbol.to_string(),
        is_anomaly: true,
        anomaly_type: AnomalyType::from_change(change),
        severity,
        description: format!("{} is {:+.2}% from the average buy price", symbol, change),
        detected_at: Utc::now(),
        price_change_percent: change,
        z_score: 0.0,
        method: Some(DetectionMethod::Threshold),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_uses_strict_comparison() {
        assert!(threshold_detect("AAPL", 110.0, 100.0, AssetClass::Stock).is_none());
        let a = threshold_detect("AAPL", 111.0, 100.0, AssetClass::Stock).unwrap();
        assert_eq!(a.severity, Severity::Medium);
    }

    #[test]
    fn drop_below_average_is_labelled_as_drop() {
        let a = threshold_detect("ETH", 70.0, 100.0, AssetClass::Crypto).unwrap();
        assert_eq!(a.anomaly_type, AnomalyType::PriceDrop);
        assert!(a.description.contains("-30.00%"));
    }

    #[test]
    fn threshold_description_uses_only_recorded_fields() {
        let a = threshold_detect("BTC", 125.0, 100.0, AssetClass::Crypto).unwrap();
        assert_eq!(
            a.description,
            format!("{} is {:+.2}% from the average buy price", a.symbol, a.price_change_percent)
        );
    }

    #[test]
    fn zscore_requires_ten_points() {
        let history = [100.0, 101.0, 99.0, 100.0];
        assert!(zscore_detect("X", &history, 200.0, AssetClass::Stock).is_none());
    }
}
