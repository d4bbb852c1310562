use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::series::{log_returns, mean_std};

use super::{FittedModel, ForecastModel, Hyperparameters, ModelKind};

const DRIFT_WINDOW: usize = 14;
const DEFAULT_SIGMA: f64 = 0.02;

/// Deterministic drift extrapolation used when data is too short for the
/// rich strategies or all of them fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftFit {
    pub last_price: f64,
    /// Mean log return per step over the trailing window.
    pub drift: f64,
    pub sigma: f64,
}

impl DriftFit {
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| (self.last_price * (self.drift * h as f64).exp()).max(0.0))
            .collect()
    }
}

impl ForecastModel for DriftModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Fallback
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        let Some(&last_price) = prices.last() else {
            return Err(AppError::InsufficientData {
                required: 1,
                actual: 0,
            });
        };
        let window = params.get_usize_or("window", DRIFT_WINDOW).max(2);
        let start = prices.len().saturating_sub(window);
        let returns = log_returns(&prices[start..]);
        let (drift, sigma) = if returns.len() >= 2 {
            mean_std(&returns)
        } else {
            (returns.first().copied().unwrap_or(0.0), DEFAULT_SIGMA)
        };
        // Damp the drift so a short burst does not extrapolate exponentially.
        let drift = (drift * 0.5).clamp(-0.05, 0.05);
        Ok(FittedModel::Fallback(DriftFit {
            last_price: last_price.max(0.0),
            drift,
            sigma: if sigma > 0.0 { sigma } else { DEFAULT_SIGMA },
        }))
    }
}
