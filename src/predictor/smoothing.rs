use serde::{Deserialize, Serialize};

use crate::error::AppResult;

use super::{require_points, FittedModel, ForecastModel, Hyperparameters, ModelKind};

#[derive(Debug, Clone, Copy)]
pub struct HoltConfig {
    pub alpha: f64,
    pub beta: f64,
    pub alpha_var: f64,
    /// Per-step multiplicative damping applied to the trend when forecasting.
    pub damping: f64,
}

impl Default for HoltConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.1,
            alpha_var: 0.08,
            damping: 0.98,
        }
    }
}

impl HoltConfig {
    pub fn from_params(params: &Hyperparameters) -> Self {
        let d = Self::default();
        Self {
            alpha: params.get_or("alpha", d.alpha).clamp(0.01, 0.99),
            beta: params.get_or("beta", d.beta).clamp(0.001, 0.99),
            alpha_var: d.alpha_var,
            damping: params.get_or("damping", d.damping).clamp(0.8, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct HoltState {
    level: f64,
    trend: f64,
    var: f64,
    samples: u64,
}

impl HoltState {
    fn update(&mut self, log_price: f64, cfg: HoltConfig) {
        let a = cfg.alpha;
        let b = cfg.beta;
        let a_var = cfg.alpha_var.clamp(0.0, 1.0);
        match self.samples {
            0 => {
                self.level = log_price;
                self.trend = 0.0;
            }
            1 => {
                self.trend = log_price - self.level;
                self.level = log_price;
            }
            _ => {
                let pred = self.level + self.trend;
                let new_level = a * log_price + (1.0 - a) * pred;
                let new_trend = b * (new_level - self.level) + (1.0 - b) * self.trend;
                let err = log_price - pred;
                self.var = if self.samples == 2 {
                    err * err
                } else {
                    (1.0 - a_var) * self.var + a_var * (err * err)
                };
                self.level = new_level;
                self.trend = new_trend;
            }
        }
        self.samples = self.samples.saturating_add(1);
    }
}

/// Holt double exponential smoothing on log prices.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoltModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoltFit {
    pub level: f64,
    pub trend: f64,
    pub damping: f64,
    pub sigma: f64,
}

impl HoltFit {
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(horizon);
        let mut cum_trend = 0.0;
        let mut phi = 1.0;
        for _ in 0..horizon {
            phi *= self.damping;
            cum_trend += phi * self.trend;
            out.push((self.level + cum_trend).exp());
        }
        out
    }
}

impl ForecastModel for HoltModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Holt
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        require_points(self.kind(), prices)?;
        let cfg = HoltConfig::from_params(params);
        let mut st = HoltState::default();
        for p in prices {
            st.update(p.ln(), cfg);
        }
        Ok(FittedModel::Holt(HoltFit {
            level: st.level,
            trend: st.trend,
            damping: cfg.damping,
            sigma: st.var.max(0.0).sqrt(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_a_steady_uptrend() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let fit = HoltModel.fit(&prices, &Hyperparameters::new()).unwrap();
        let path = fit.predict(5);
        let last = *prices.last().unwrap();
        assert!(path[0] > last);
        assert!(path[4] > path[0]);
    }

    #[test]
    fn parameters_are_clamped() {
        let cfg = HoltConfig::from_params(&Hyperparameters::new().with("alpha", 4.0));
        assert!((cfg.alpha - 0.99).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_series() {
        assert!(HoltModel.fit(&[1.0, 2.0], &Hyperparameters::new()).is_err());
    }
}
