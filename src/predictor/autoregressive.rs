use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::series::log_returns;

use super::rls::Rls;
use super::{require_points, FittedModel, ForecastModel, Hyperparameters, ModelKind};

pub const DEFAULT_LAGS: usize = 5;
pub const DEFAULT_RIDGE: f64 = 1e-2;
const MAX_LAGS: usize = 20;
/// Coefficients beyond this magnitude are clipped to keep the recursion stable.
const PHI_CLIP: f64 = 0.98;

/// AR(p) on log returns with an intercept, fitted by recursive least squares.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArFit {
    pub last_price: f64,
    pub intercept: f64,
    /// phi[0] multiplies the most recent return.
    pub phi: Vec<f64>,
    /// Most recent returns, newest first.
    pub recent: Vec<f64>,
    /// Largest absolute return seen in training; predicted returns are
    /// clamped to it so the recursion cannot run away.
    pub max_abs_return: f64,
    pub sigma: f64,
}

impl ArFit {
    /// Recursive multi-step forecast: each predicted return becomes the
    /// newest lag for the following step.
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let mut lags = self.recent.clone();
        let mut log_price = self.last_price.ln();
        let cap = self.max_abs_return;
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let r = (self.intercept
                + self
                    .phi
                    .iter()
                    .zip(&lags)
                    .map(|(phi, r)| phi * r)
                    .sum::<f64>())
            .clamp(-cap, cap);
            log_price += r;
            out.push(log_price.exp());
            lags.insert(0, r);
            lags.truncate(self.phi.len());
        }
        out
    }
}

impl ForecastModel for ArModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Autoregressive
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        require_points(self.kind(), prices)?;
        let lags = params.get_usize_or("lags", DEFAULT_LAGS).clamp(1, MAX_LAGS);
        let ridge = params.get_or("ridge", DEFAULT_RIDGE).max(1e-6);
        let returns = log_returns(prices);
        if returns.len() < lags * 3 {
            return Err(AppError::InsufficientData {
                required: lags * 3 + 1,
                actual: prices.len(),
            });
        }

        let mut rls = Rls::new(lags + 1, 1.0, ridge);
        let mut sq_err = 0.0;
        let mut n_err = 0usize;
        let warmup = lags * 2;
        for t in lags..returns.len() {
            let x = features(&returns[t - lags..t]);
            if t >= warmup {
                let e = returns[t] - rls.predict(&x);
                sq_err += e * e;
                n_err += 1;
            }
            rls.update(&x, returns[t]);
        }
        if rls.beta.iter().any(|b| !b.is_finite()) {
            return Err(AppError::fit("autoregressive", "coefficients diverged"));
        }

        let intercept = rls.beta[0];
        let phi: Vec<f64> = rls.beta[1..]
            .iter()
            .map(|b| b.clamp(-PHI_CLIP, PHI_CLIP))
            .collect();
        let recent: Vec<f64> = returns[returns.len() - lags..].iter().rev().copied().collect();
        let sigma = if n_err > 0 {
            (sq_err / n_err as f64).sqrt()
        } else {
            0.0
        };
        Ok(FittedModel::Autoregressive(ArFit {
            last_price: *prices.last().unwrap_or(&0.0),
            intercept,
            phi,
            recent,
            max_abs_return: returns.iter().fold(0.0, |m, r| m.max(r.abs())),
            sigma,
        }))
    }
}

/// [1, r_{t-1}, r_{t-2}, ...] from a window ordered oldest to newest.
fn features(window: &[f64]) -> Vec<f64> {
    let mut x = Vec::with_capacity(window.len() + 1);
    x.push(1.0);
    x.extend(window.iter().rev());
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ar1_series(phi: f64, n: usize) -> Vec<f64> {
        let mut price = 100.0f64;
        let mut r = 0.0;
        let mut out = vec![price];
        for i in 0..n {
            let shock = ((i as f64) * 1.618).sin() * 0.01;
            r = phi * r + shock;
            price *= r.exp();
            out.push(price);
        }
        out
    }

    #[test]
    fn fits_and_produces_finite_recursive_path() {
        let prices = ar1_series(0.5, 200);
        let fit = ArModel.fit(&prices, &Hyperparameters::new()).unwrap();
        let path = fit.predict(7);
        assert_eq!(path.len(), 7);
        assert!(path.iter().all(|p| p.is_finite() && *p > 0.0));
    }

    #[test]
    fn recovers_positive_persistence() {
        let prices = ar1_series(0.6, 400);
        let params = Hyperparameters::new().with("lags", 1.0);
        let FittedModel::Autoregressive(fit) = ArModel.fit(&prices, &params).unwrap() else {
            panic!("expected AR fit");
        };
        assert!(fit.phi[0] > 0.2);
    }
}
