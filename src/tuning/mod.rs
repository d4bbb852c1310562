//! Black-box hyperparameter search scored by a walk-forward objective.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{hyperparams_key, ModelCache};
use crate::capabilities::Capabilities;
use crate::config::TuningConfig;
use crate::error::AppResult;
use crate::model::PriceSeries;
use crate::predictor::{Hyperparameters, ModelKind};

pub mod objective;
pub mod space;

pub use objective::{objective, OBJECTIVE_HORIZON, SENTINEL_MAPE, SPLIT_FRACTIONS};
pub use space::{default_params, search_space, ParamAxis};

/// Histories shorter than this are not searched.
pub const MIN_TUNING_POINTS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub model: ModelKind,
    pub params: Hyperparameters,
    /// Objective value of `params`, in percent.
    pub best_mape: f64,
    pub trials_run: usize,
    /// True when the search was skipped and `params` are the documented defaults.
    pub used_defaults: bool,
}

#[derive(Debug, Clone)]
pub struct HyperparameterTuner {
    caps: Capabilities,
    n_trials: usize,
    seed: u64,
}

impl HyperparameterTuner {
    pub fn new(caps: Capabilities, cfg: &TuningConfig) -> Self {
        Self {
            caps,
            n_trials: cfg.n_trials,
            seed: cfg.seed,
        }
    }

    pub fn tune_holt(&self, series: &PriceSeries, n_trials: Option<usize>) -> TuningOutcome {
        self.tune(ModelKind::Holt, series, n_trials)
    }

    pub fn tune_seasonal(&self, series: &PriceSeries, n_trials: Option<usize>) -> TuningOutcome {
        self.tune(ModelKind::Seasonal, series, n_trials)
    }

    pub fn tune_autoregressive(
        &self,
        series: &PriceSeries,
        n_trials: Option<usize>,
    ) -> TuningOutcome {
        self.tune(ModelKind::Autoregressive, series, n_trials)
    }

    pub fn tune_boosting(&self, series: &PriceSeries, n_trials: Option<usize>) -> TuningOutcome {
        self.tune(ModelKind::Boosting, series, n_trials)
    }

    /// Search `kind`'s parameter space. Falls back to the documented defaults
    /// (with `used_defaults` set) when the optimizer or model is not
    /// available, the history is under `MIN_TUNING_POINTS`, or the search
    /// itself errors.
    pub fn tune(&self, kind: ModelKind, series: &PriceSeries, n_trials: Option<usize>) -> TuningOutcome {
        let prices = series.prices();
        let n_trials = n_trials.unwrap_or(self.n_trials);
        let reason = if !self.caps.tuning || !cfg!(feature = "tuning") {
            Some("optimizer not available")
        } else if !kind.is_available(self.caps) {
            Some("model not available")
        } else if search_space(kind).is_empty() {
            Some("model has no search space")
        } else if prices.len() < MIN_TUNING_POINTS {
            Some("insufficient data")
        } else if n_trials == 0 {
            Some("zero trials requested")
        } else {
            None
        };
        if let Some(reason) = reason {
            return self.defaults(kind, &prices, reason);
        }
        match self.search(kind, &prices, n_trials) {
            Ok(outcome) => {
                info!(
                    model = %kind,
                    trials = outcome.trials_run,
                    best_mape = outcome.best_mape,
                    "Tuning finished"
                );
                outcome
            }
            Err(e) => self.defaults(kind, &prices, &e.to_string()),
        }
    }

    fn defaults(&self, kind: ModelKind, prices: &[f64], reason: &str) -> TuningOutcome {
        info!(model = %kind, points = prices.len(), reason = %reason, "Using default hyperparameters");
        let params = default_params(kind);
        TuningOutcome {
            model: kind,
            best_mape: objective(kind, prices, &params),
            params,
            trials_run: 0,
            used_defaults: true,
        }
    }

    #[cfg(feature = "tuning")]
    fn search(&self, kind: ModelKind, prices: &[f64], n_trials: usize) -> AppResult<TuningOutcome> {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        use crate::error::AppError;

        let space = search_space(kind);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut optimizers = space
            .iter()
            .map(|axis| {
                tpe::range(axis.min, axis.max)
                    .map(|range| tpe::TpeOptimizer::new(tpe::parzen_estimator(), range))
                    .map_err(|e| AppError::Tuning(format!("bad range for {}: {:?}", axis.name, e)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let mut best_params = default_params(kind);
        let mut best_mape = objective(kind, prices, &best_params);
        for _ in 0..n_trials {
            let mut raw = Vec::with_capacity(space.len());
            let mut params = default_params(kind);
            for (axis, opt) in space.iter().zip(optimizers.iter_mut()) {
                let sampled = opt
                    .ask(&mut rng)
                    .map_err(|e| AppError::Tuning(format!("sampling {}: {:?}", axis.name, e)))?;
                // The optimizer only accepts values from its half-open range,
                // so it is told the raw sample and the model gets the rounded one.
                let v = if axis.integer { sampled.round() } else { sampled };
                params.insert(axis.name, v.clamp(axis.min, axis.max));
                raw.push(sampled);
            }
            let score = objective(kind, prices, &params);
            for (opt, v) in optimizers.iter_mut().zip(&raw) {
                opt.tell(*v, score)
                    .map_err(|e| AppError::Tuning(format!("recording trial: {:?}", e)))?;
            }
            if score < best_mape {
                best_mape = score;
                best_params = params;
            }
        }
        Ok(TuningOutcome {
            model: kind,
            params: best_params,
            best_mape,
            trials_run: n_trials,
            used_defaults: false,
        })
    }

    #[cfg(not(feature = "tuning"))]
    fn search(&self, kind: ModelKind, _prices: &[f64], _n_trials: usize) -> AppResult<TuningOutcome> {
        Err(crate::error::AppError::Tuning(format!(
            "tuning support not compiled in for {}",
            kind
        )))
    }
}

/// Persist searched parameters for `symbol`. Default outcomes are not stored,
/// so a later forecast keeps using its own defaults. Returns whether anything
/// was written.
pub fn store_tuned(
    cache: &dyn ModelCache,
    symbol: &str,
    outcome: &TuningOutcome,
    ttl: Duration,
) -> AppResult<bool> {
    if outcome.used_defaults {
        return Ok(false);
    }
    let bytes = serde_json::to_vec(&outcome.params)?;
    cache.set(&hyperparams_key(symbol, outcome.model), &bytes, ttl)?;
    Ok(true)
}
