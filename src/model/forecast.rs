use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

impl PredictionPoint {
    pub fn band_width(&self) -> f64 {
        self.confidence_high - self.confidence_low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub symbol: String,
    pub current_price: f64,
    pub predictions: Vec<PredictionPoint>,
    pub trend: Trend,
    /// 0..=100
    pub trend_strength: f64,
    pub support_level: f64,
    pub resistance_level: f64,
    /// Strategy (or ensemble of strategies) that produced `predictions`.
    pub model_used: String,
}

impl ForecastResult {
    /// Result for a symbol with no usable history.
    pub fn no_data(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            current_price: 0.0,
            predictions: Vec::new(),
            trend: Trend::Neutral,
            trend_strength: 0.0,
            support_level: 0.0,
            resistance_level: 0.0,
            model_used: "none".to_string(),
        }
    }

    pub fn predicted_prices(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.price).collect()
    }
}
