use std::fmt;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, CAPABILITIES};
use crate::error::{AppError, AppResult};
use crate::model::{ForecastResult, PredictionPoint, PriceSeries, Trend};

use super::{
    strategy_for, validate_path, FittedModel, HyperparameterBook, Hyperparameters, ModelKind,
};

/// Histories shorter than this go straight to the fallback strategy.
pub const MIN_ENSEMBLE_POINTS: usize = 30;

const Z_95: f64 = 1.96;
const TREND_THRESHOLD: f64 = 1.0;
const FORECAST_WEIGHT: f64 = 0.6;
const MOMENTUM_WEIGHT: f64 = 0.4;
const MOMENTUM_WINDOW: usize = 7;
const MOMENTUM_MIN_POINTS: usize = 5;
const LEVEL_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSelection {
    Ensemble,
    Single(ModelKind),
}

impl ModelSelection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ensemble => "ensemble",
            Self::Single(kind) => kind.name(),
        }
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct PriceForecaster {
    caps: Capabilities,
    params: HyperparameterBook,
}

impl Default for PriceForecaster {
    fn default() -> Self {
        Self::new(CAPABILITIES)
    }
}

impl PriceForecaster {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            params: HyperparameterBook::default(),
        }
    }

    pub fn with_params(mut self, params: HyperparameterBook) -> Self {
        self.params = params;
        self
    }

    pub fn set_params(&mut self, kind: ModelKind, params: Hyperparameters) {
        self.params.set(kind, params);
    }

    pub fn params_for(&self, kind: ModelKind) -> Hyperparameters {
        self.params.get(kind)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn forecast(&self, symbol: &str, series: &PriceSeries, days_ahead: usize) -> ForecastResult {
        self.forecast_with(symbol, series, days_ahead, ModelSelection::Ensemble)
    }

    /// Forecast with an explicit strategy selection. Never fails: strategies
    /// that cannot fit are skipped and the drift fallback covers the rest.
    pub fn forecast_with(
        &self,
        symbol: &str,
        series: &PriceSeries,
        days_ahead: usize,
        selection: ModelSelection,
    ) -> ForecastResult {
        let prices = series.prices();
        if prices.is_empty() {
            debug!(symbol = %symbol, "No history; returning empty forecast");
            return ForecastResult::no_data(symbol);
        }
        let horizon = days_ahead.max(1);
        let mut fits = Vec::new();
        for kind in self.candidate_kinds(prices.len(), selection) {
            match self.fit_one(kind, &prices, horizon) {
                Ok(fit) => fits.push(fit),
                Err(e) => warn!(symbol = %symbol, model = %kind, error = %e, "Strategy excluded"),
            }
        }
        if fits.is_empty() {
            match self.fit_one(ModelKind::Fallback, &prices, horizon) {
                Ok(fit) => {
                    info!(symbol = %symbol, points = prices.len(), "Using fallback strategy");
                    fits.push(fit);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Fallback strategy failed");
                    return ForecastResult::no_data(symbol);
                }
            }
        }
        self.assemble(symbol, series, &fits, days_ahead)
    }

    /// Strategies worth attempting for a history of `n` points.
    pub fn candidate_kinds(&self, n: usize, selection: ModelSelection) -> Vec<ModelKind> {
        match selection {
            ModelSelection::Ensemble if n < MIN_ENSEMBLE_POINTS => Vec::new(),
            ModelSelection::Ensemble => ModelKind::RICH
                .iter()
                .copied()
                .filter(|k| k.is_available(self.caps) && n >= k.min_points())
                .collect(),
            ModelSelection::Single(ModelKind::Fallback) => Vec::new(),
            ModelSelection::Single(kind) => vec![kind],
        }
    }

    /// Fit one strategy with this forecaster's parameters and check that it
    /// yields a usable path over `horizon` steps.
    pub fn fit_one(&self, kind: ModelKind, prices: &[f64], horizon: usize) -> AppResult<FittedModel> {
        if !kind.is_available(self.caps) {
            return Err(AppError::fit(kind.name(), "not available in this build"));
        }
        let strategy =
            strategy_for(kind).ok_or_else(|| AppError::fit(kind.name(), "not compiled in"))?;
        if prices.len() < strategy.min_points() {
            return Err(AppError::InsufficientData {
                required: strategy.min_points(),
                actual: prices.len(),
            });
        }
        let fit = strategy.fit(prices, &self.params.get(kind))?;
        validate_path(kind, &fit.predict(horizon), horizon)?;
        Ok(fit)
    }

    /// Combine fitted strategies into a forecast with bands, trend and levels.
    pub fn assemble(
        &self,
        symbol: &str,
        series: &PriceSeries,
        fits: &[FittedModel],
        days_ahead: usize,
    ) -> ForecastResult {
        let Some(last) = series.last() else {
            return ForecastResult::no_data(symbol);
        };
        if fits.is_empty() {
            return ForecastResult::no_data(symbol);
        }
        let prices = series.prices();
        let current_price = last.price;

        let paths: Vec<Vec<f64>> = fits.iter().map(|f| f.predict(days_ahead)).collect();
        let sigmas: Vec<f64> = fits.iter().map(FittedModel::sigma).collect();
        let weights = inverse_variance_weights(&sigmas);

        let mut predictions = Vec::with_capacity(days_ahead);
        let mut prev_width = 0.0f64;
        for h in 0..days_ahead {
            let step: Vec<f64> = paths.iter().map(|p| p[h]).collect();
            let price = weighted_mean(&step, &weights).max(0.0);
            let sigma = weighted_mean(&sigmas, &weights);
            let dispersion = log_dispersion(&step, &weights, price);
            let half = Z_95 * (sigma * sigma * (h + 1) as f64 + dispersion * dispersion).sqrt();

            let mut low = (price * (-half).exp()).max(0.0);
            let mut high = price * half.exp();
            if !low.is_finite() || !high.is_finite() {
                low = price;
                high = price;
            }
            let width = high - low;
            if width < prev_width {
                high += prev_width - width;
            }
            prev_width = high - low;

            predictions.push(PredictionPoint {
                date: last.timestamp + Duration::days(h as i64 + 1),
                price,
                confidence_low: low,
                confidence_high: high,
            });
        }

        let day1 = predictions.first().map(|p| p.price).unwrap_or(current_price);
        let (trend, trend_strength) = classify_trend(current_price, day1, &prices);
        let tail = &prices[prices.len().saturating_sub(LEVEL_WINDOW)..];
        let support_level = tail.iter().copied().fold(f64::INFINITY, f64::min);
        let resistance_level = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        ForecastResult {
            symbol: symbol.to_string(),
            current_price,
            predictions,
            trend,
            trend_strength,
            support_level,
            resistance_level,
            model_used: model_label(fits),
        }
    }
}

fn model_label(fits: &[FittedModel]) -> String {
    match fits {
        [single] => single.kind().name().to_string(),
        many => {
            let names: Vec<&str> = many.iter().map(|f| f.kind().name()).collect();
            format!("ensemble({})", names.join("+"))
        }
    }
}

/// Weights proportional to 1/sigma^2. Sigmas are floored at half the group
/// median so one overfit strategy cannot take the whole ensemble.
fn inverse_variance_weights(sigmas: &[f64]) -> Vec<f64> {
    let mut sorted = sigmas.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
    let floor = (0.5 * median).max(f64::EPSILON);
    sigmas
        .iter()
        .map(|s| {
            let s = s.max(floor);
            1.0 / (s * s)
        })
        .collect()
}

fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    if let [only] = values {
        return *only;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return values.iter().sum::<f64>() / values.len().max(1) as f64;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

/// Weighted standard deviation of member forecasts around `center`, in log space.
fn log_dispersion(values: &[f64], weights: &[f64], center: f64) -> f64 {
    if values.len() < 2 || center <= 0.0 {
        return 0.0;
    }
    let lc = center.ln();
    let total: f64 = weights.iter().sum();
    let var = values
        .iter()
        .zip(weights)
        .filter(|(v, _)| **v > 0.0)
        .map(|(v, w)| w * (v.ln() - lc).powi(2))
        .sum::<f64>()
        / total.max(f64::EPSILON);
    var.sqrt()
}

/// Trend from the day-1 forecast delta (60%) and trailing momentum (40%).
/// Histories under five points use the forecast delta alone. Strength is the
/// scaled absolute score, capped at 100.
pub fn classify_trend(current_price: f64, day1_forecast: f64, history: &[f64]) -> (Trend, f64) {
    if !current_price.is_finite() || current_price <= 0.0 || !day1_forecast.is_finite() {
        return (Trend::Neutral, 0.0);
    }
    let delta = (day1_forecast - current_price) / current_price * 100.0;
    let score = if history.len() >= MOMENTUM_MIN_POINTS {
        let lookback = MOMENTUM_WINDOW.min(history.len() - 1);
        let past = history[history.len() - 1 - lookback];
        let momentum = if past > 0.0 {
            (current_price - past) / past * 100.0
        } else {
            0.0
        };
        FORECAST_WEIGHT * delta + MOMENTUM_WEIGHT * momentum
    } else {
        delta
    };
    let strength = (score.abs() * 10.0).min(100.0);
    let trend = if score > TREND_THRESHOLD {
        Trend::Bullish
    } else if score < -TREND_THRESHOLD {
        Trend::Bearish
    } else {
        Trend::Neutral
    };
    (trend, strength)
}
