use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::{require_points, FittedModel, ForecastModel, Hyperparameters, ModelKind};

pub const DEFAULT_PERIOD: usize = 7;

/// Additive Holt-Winters on log prices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalFit {
    pub level: f64,
    pub trend: f64,
    pub damping: f64,
    /// Seasonal offsets, one per phase of the cycle.
    pub season: Vec<f64>,
    /// Phase of the first forecast step.
    pub next_phase: usize,
    pub sigma: f64,
}

impl SeasonalFit {
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let period = self.season.len().max(1);
        let mut out = Vec::with_capacity(horizon);
        let mut cum_trend = 0.0;
        let mut phi = 1.0;
        for h in 0..horizon {
            phi *= self.damping;
            cum_trend += phi * self.trend;
            let s = self
                .season
                .get((self.next_phase + h) % period)
                .copied()
                .unwrap_or(0.0);
            out.push((self.level + cum_trend + s).exp());
        }
        out
    }
}

impl SeasonalModel {
    fn min_points_for(period: usize) -> usize {
        ModelKind::Seasonal.min_points().max(2 * period + 2)
    }
}

impl ForecastModel for SeasonalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Seasonal
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        require_points(self.kind(), prices)?;
        let period = params.get_usize_or("period", DEFAULT_PERIOD).clamp(2, 60);
        let required = Self::min_points_for(period);
        if prices.len() < required {
            return Err(AppError::InsufficientData {
                required,
                actual: prices.len(),
            });
        }
        let alpha = params.get_or("alpha", 0.3).clamp(0.01, 0.99);
        let beta = params.get_or("beta", 0.05).clamp(0.001, 0.99);
        let gamma = params.get_or("gamma", 0.1).clamp(0.001, 0.99);
        let damping = params.get_or("damping", 0.98).clamp(0.8, 1.0);

        let ys: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
        let first = mean(&ys[..period]);
        let second = mean(&ys[period..2 * period]);
        let mut level = first;
        let mut trend = (second - first) / period as f64;
        let mut season: Vec<f64> = ys[..period].iter().map(|y| y - first).collect();

        let mut sq_err = 0.0;
        let mut n_err = 0usize;
        for (t, y) in ys.iter().enumerate().skip(period) {
            let phase = t % period;
            let pred = level + damping * trend + season[phase];
            let err = y - pred;
            sq_err += err * err;
            n_err += 1;

            let prev_level = level;
            level = alpha * (y - season[phase]) + (1.0 - alpha) * (prev_level + damping * trend);
            trend = beta * (level - prev_level) + (1.0 - beta) * damping * trend;
            season[phase] = gamma * (y - level) + (1.0 - gamma) * season[phase];
        }
        if !level.is_finite() || !trend.is_finite() {
            return Err(AppError::fit("seasonal", "state diverged"));
        }

        Ok(FittedModel::Seasonal(SeasonalFit {
            level,
            trend,
            damping,
            season,
            next_phase: ys.len() % period,
            sigma: if n_err > 0 {
                (sq_err / n_err as f64).sqrt()
            } else {
                0.0
            },
        }))
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}
