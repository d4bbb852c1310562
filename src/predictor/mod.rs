//! Forecasting strategies sharing one fit-and-predict capability, plus the
//! forecaster that cascades through them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::error::{AppError, AppResult};

#[cfg(feature = "autoregressive")]
pub mod autoregressive;
#[cfg(feature = "boosting")]
pub mod boosting;
pub mod cached;
pub mod fallback;
pub mod forecaster;
pub mod linear;
#[cfg(feature = "autoregressive")]
mod rls;
#[cfg(feature = "seasonal")]
pub mod seasonal;
pub mod smoothing;

pub use cached::CachedForecaster;
pub use forecaster::{classify_trend, ModelSelection, PriceForecaster, MIN_ENSEMBLE_POINTS};

/// Floor for per-step log-return sigma used in confidence bands.
pub const MIN_SIGMA: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Fallback,
    Holt,
    Linear,
    Seasonal,
    Autoregressive,
    Boosting,
}

impl ModelKind {
    /// Rich strategies in the order the ensemble tries them.
    pub const RICH: [ModelKind; 5] = [
        ModelKind::Holt,
        ModelKind::Linear,
        ModelKind::Seasonal,
        ModelKind::Autoregressive,
        ModelKind::Boosting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Holt => "holt",
            Self::Linear => "linear",
            Self::Seasonal => "seasonal",
            Self::Autoregressive => "autoregressive",
            Self::Boosting => "boosting",
        }
    }

    pub fn min_points(self) -> usize {
        match self {
            Self::Fallback => 1,
            Self::Holt | Self::Linear => 10,
            Self::Seasonal => 30,
            Self::Autoregressive => 50,
            Self::Boosting => 60,
        }
    }

    pub fn is_available(self, caps: Capabilities) -> bool {
        match self {
            Self::Fallback | Self::Holt | Self::Linear => true,
            Self::Seasonal => caps.seasonal && cfg!(feature = "seasonal"),
            Self::Autoregressive => caps.autoregressive && cfg!(feature = "autoregressive"),
            Self::Boosting => caps.boosting && cfg!(feature = "boosting"),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "holt" | "exponential_smoothing" => Ok(Self::Holt),
            "linear" | "linear_regression" => Ok(Self::Linear),
            "seasonal" | "holt_winters" => Ok(Self::Seasonal),
            "autoregressive" | "ar" => Ok(Self::Autoregressive),
            "boosting" | "gbm" => Ok(Self::Boosting),
            other => Err(AppError::Config(format!("unknown model '{}'", other))),
        }
    }
}

/// Named numeric parameters for one model. Missing entries fall back to the
/// model's documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters(BTreeMap<String, f64>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn get_usize_or(&self, name: &str, default: usize) -> usize {
        self.get(name)
            .map(|v| v.round().max(0.0) as usize)
            .unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hyperparameters per model kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterBook(BTreeMap<ModelKind, Hyperparameters>);

impl HyperparameterBook {
    pub fn set(&mut self, kind: ModelKind, params: Hyperparameters) {
        self.0.insert(kind, params);
    }

    pub fn get(&self, kind: ModelKind) -> Hyperparameters {
        self.0.get(&kind).cloned().unwrap_or_default()
    }
}

/// A strategy that can be fitted to a price history.
pub trait ForecastModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn min_points(&self) -> usize {
        self.kind().min_points()
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel>;
}

/// Fitted model state. Predictions are a pure function of this value, so a
/// model restored from the cache reproduces the original forecast exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    Fallback(fallback::DriftFit),
    Holt(smoothing::HoltFit),
    Linear(linear::LinearFit),
    #[cfg(feature = "seasonal")]
    Seasonal(seasonal::SeasonalFit),
    #[cfg(feature = "autoregressive")]
    Autoregressive(autoregressive::ArFit),
    #[cfg(feature = "boosting")]
    Boosting(boosting::BoostedFit),
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Fallback(_) => ModelKind::Fallback,
            Self::Holt(_) => ModelKind::Holt,
            Self::Linear(_) => ModelKind::Linear,
            #[cfg(feature = "seasonal")]
            Self::Seasonal(_) => ModelKind::Seasonal,
            #[cfg(feature = "autoregressive")]
            Self::Autoregressive(_) => ModelKind::Autoregressive,
            #[cfg(feature = "boosting")]
            Self::Boosting(_) => ModelKind::Boosting,
        }
    }

    /// Point forecasts for steps 1..=horizon.
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        match self {
            Self::Fallback(m) => m.predict(horizon),
            Self::Holt(m) => m.predict(horizon),
            Self::Linear(m) => m.predict(horizon),
            #[cfg(feature = "seasonal")]
            Self::Seasonal(m) => m.predict(horizon),
            #[cfg(feature = "autoregressive")]
            Self::Autoregressive(m) => m.predict(horizon),
            #[cfg(feature = "boosting")]
            Self::Boosting(m) => m.predict(horizon),
        }
    }

    /// One-step residual sigma in log-return units.
    pub fn sigma(&self) -> f64 {
        let s = match self {
            Self::Fallback(m) => m.sigma,
            Self::Holt(m) => m.sigma,
            Self::Linear(m) => m.sigma,
            #[cfg(feature = "seasonal")]
            Self::Seasonal(m) => m.sigma,
            #[cfg(feature = "autoregressive")]
            Self::Autoregressive(m) => m.sigma,
            #[cfg(feature = "boosting")]
            Self::Boosting(m) => m.sigma,
        };
        if s.is_finite() {
            s.max(MIN_SIGMA)
        } else {
            MIN_SIGMA
        }
    }

    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Strategy object for a kind, or `None` when the kind is not compiled in.
pub fn strategy_for(kind: ModelKind) -> Option<Box<dyn ForecastModel>> {
    match kind {
        ModelKind::Fallback => Some(Box::new(fallback::DriftModel)),
        ModelKind::Holt => Some(Box::new(smoothing::HoltModel)),
        ModelKind::Linear => Some(Box::new(linear::LinearModel)),
        #[cfg(feature = "seasonal")]
        ModelKind::Seasonal => Some(Box::new(seasonal::SeasonalModel)),
        #[cfg(feature = "autoregressive")]
        ModelKind::Autoregressive => Some(Box::new(autoregressive::ArModel)),
        #[cfg(feature = "boosting")]
        ModelKind::Boosting => Some(Box::new(boosting::BoostingModel)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Ordered rich strategies usable under `caps`.
pub fn rich_strategies(caps: Capabilities) -> Vec<Box<dyn ForecastModel>> {
    ModelKind::RICH
        .iter()
        .filter(|k| k.is_available(caps))
        .filter_map(|k| strategy_for(*k))
        .collect()
}

/// Rejects empty, non-finite or negative paths.
pub(crate) fn validate_path(kind: ModelKind, path: &[f64], horizon: usize) -> AppResult<()> {
    if path.len() != horizon {
        return Err(AppError::fit(
            kind.name(),
            format!("expected {} steps, got {}", horizon, path.len()),
        ));
    }
    if path.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(AppError::fit(kind.name(), "non-finite or negative forecast"));
    }
    Ok(())
}

pub(crate) fn require_points(kind: ModelKind, prices: &[f64]) -> AppResult<()> {
    let required = kind.min_points();
    if prices.len() < required {
        return Err(AppError::InsufficientData {
            required,
            actual: prices.len(),
        });
    }
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(AppError::fit(kind.name(), "prices must be finite and positive"));
    }
    Ok(())
}
