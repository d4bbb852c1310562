use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    PriceSpike,
    PriceDrop,
    VolatilitySpike,
    None,
}

impl AnomalyType {
    /// Spike for a positive move, drop for a negative one.
    pub fn from_change(change_percent: f64) -> Self {
        if change_percent >= 0.0 {
            Self::PriceSpike
        } else {
            Self::PriceDrop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    IsolationForest,
    ZScore,
    Threshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub symbol: String,
    pub is_anomaly: bool,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub price_change_percent: f64,
    pub z_score: f64,
    pub method: Option<DetectionMethod>,
}

impl Anomaly {
    pub fn none(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            is_anomaly: false,
            anomaly_type: AnomalyType::None,
            severity: Severity::Low,
            description: format!("No abnormal price movement detected for {}", symbol),
            detected_at: Utc::now(),
            price_change_percent: 0.0,
            z_score: 0.0,
            method: None,
        }
    }
}
