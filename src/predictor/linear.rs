use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::{require_points, FittedModel, ForecastModel, Hyperparameters, ModelKind};

const DEFAULT_WINDOW: usize = 90;

/// Ordinary least squares of log price on the time index over a trailing
/// window.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Index of the last observation relative to the fit window.
    pub last_index: f64,
    /// Residual of the last observation; forecasts are anchored to it and it
    /// decays geometrically over the horizon.
    pub last_residual: f64,
    pub sigma: f64,
}

impl LinearFit {
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let x = self.last_index + h as f64;
                let anchor = self.last_residual * 0.8f64.powi(h as i32);
                (self.intercept + self.slope * x + anchor).exp()
            })
            .collect()
    }
}

impl ForecastModel for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        require_points(self.kind(), prices)?;
        let window = params
            .get_usize_or("window", DEFAULT_WINDOW)
            .max(self.min_points());
        let start = prices.len().saturating_sub(window);
        let ys: Vec<f64> = prices[start..].iter().map(|p| p.ln()).collect();
        let n = ys.len() as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = ys.iter().sum::<f64>() / n;
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (i, y) in ys.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }
        if sxx <= f64::EPSILON {
            return Err(AppError::fit("linear", "degenerate time index"));
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        // One-step errors of the fitted line, in log-return units.
        let residuals: Vec<f64> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| y - (intercept + slope * i as f64))
            .collect();
        let step_errors: Vec<f64> = residuals.windows(2).map(|w| w[1] - w[0]).collect();
        let sigma = if step_errors.is_empty() {
            0.0
        } else {
            (step_errors.iter().map(|e| e * e).sum::<f64>() / step_errors.len() as f64).sqrt()
        };

        Ok(FittedModel::Linear(LinearFit {
            intercept,
            slope,
            last_index: n - 1.0,
            last_residual: residuals.last().copied().unwrap_or(0.0),
            sigma,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exponential_growth_rate() {
        let prices: Vec<f64> = (0..50).map(|i| 50.0 * (0.01 * i as f64).exp()).collect();
        let fit = LinearModel.fit(&prices, &Hyperparameters::new()).unwrap();
        let FittedModel::Linear(lf) = &fit else {
            panic!("expected linear fit");
        };
        assert!((lf.slope - 0.01).abs() < 1e-9);
        let next = fit.predict(1)[0];
        assert!((next - 50.0 * (0.5f64).exp()).abs() < 1e-6);
    }
}
