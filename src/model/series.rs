use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Ordered price history. Timestamps are strictly increasing and prices are
/// finite and non-negative. An empty series means "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from parallel arrays as returned by providers. Mismatched lengths
    /// are truncated to the shorter side; invalid prices and out-of-order
    /// timestamps are dropped.
    pub fn from_parallel(dates: &[DateTime<Utc>], prices: &[f64]) -> Self {
        let n = dates.len().min(prices.len());
        if dates.len() != prices.len() {
            tracing::debug!(
                dates = dates.len(),
                prices = prices.len(),
                kept = n,
                "Truncating mismatched series arrays"
            );
        }
        Self::from_points(
            dates[..n]
                .iter()
                .zip(&prices[..n])
                .map(|(timestamp, price)| PricePoint {
                    timestamp: *timestamp,
                    price: *price,
                }),
        )
    }

    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut out: Vec<PricePoint> = Vec::new();
        for p in points {
            if !p.price.is_finite() || p.price < 0.0 {
                continue;
            }
            if let Some(last) = out.last() {
                if p.timestamp <= last.timestamp {
                    continue;
                }
            }
            out.push(p);
        }
        Self { points: out }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.points.last().map(|p| p.price)
    }

    /// First `n` points (the training prefix in walk-forward splits).
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            points: self.points[..n.min(self.points.len())].to_vec(),
        }
    }

    /// Last `n` points.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            points: self.points[start..].to_vec(),
        }
    }

    pub fn log_returns(&self) -> Vec<f64> {
        log_returns(&self.prices())
    }

    pub fn simple_returns(&self) -> Vec<f64> {
        simple_returns(&self.prices())
    }
}

/// Log returns over consecutive strictly positive prices.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > f64::EPSILON && w[1] > f64::EPSILON)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > f64::EPSILON)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.max(0.0).sqrt())
}
