use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{fingerprint, fnv1a, hyperparams_key, model_key, prediction_key, ModelCache};
use crate::config::CacheConfig;
use crate::error::AppResult;
use crate::model::{ForecastResult, PriceSeries};

use super::{
    validate_path, FittedModel, HyperparameterBook, Hyperparameters, ModelKind, ModelSelection,
    PriceForecaster,
};

/// Forecaster backed by the shared cache. Predictions and tuned
/// hyperparameters are stored as JSON, fitted models as bincode. Any cache
/// failure is logged and treated as a miss.
pub struct CachedForecaster {
    inner: PriceForecaster,
    cache: Arc<dyn ModelCache>,
    prediction_ttl: Duration,
    model_ttl: Duration,
}

impl CachedForecaster {
    pub fn new(inner: PriceForecaster, cache: Arc<dyn ModelCache>, cfg: &CacheConfig) -> Self {
        Self {
            inner,
            cache,
            prediction_ttl: cfg.prediction_ttl(),
            model_ttl: cfg.model_ttl(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ModelCache> {
        &self.cache
    }

    pub fn forecast(&self, symbol: &str, series: &PriceSeries, days_ahead: usize) -> ForecastResult {
        let prices = series.prices();
        if prices.is_empty() {
            return ForecastResult::no_data(symbol);
        }
        let fp = fingerprint(&prices);
        let book = self.load_hyperparams(symbol);
        let key = prediction_key(symbol, days_ahead, fp ^ book_digest(&book));
        if let Some(hit) = self.read_json::<ForecastResult>(&key) {
            debug!(symbol = %symbol, key = %key, "Prediction cache hit");
            return hit;
        }

        let forecaster = self.inner.clone().with_params(book);
        let horizon = days_ahead.max(1);
        let mut fits = Vec::new();
        for kind in forecaster.candidate_kinds(prices.len(), ModelSelection::Ensemble) {
            match self.fitted_with(&forecaster, symbol, kind, &prices, fp, horizon) {
                Ok(fit) => fits.push(fit),
                Err(e) => warn!(symbol = %symbol, model = %kind, error = %e, "Strategy excluded"),
            }
        }
        if fits.is_empty() {
            match self.fitted_with(&forecaster, symbol, ModelKind::Fallback, &prices, fp, horizon) {
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

        let result = forecaster.assemble(symbol, series, &fits, days_ahead);
        self.write_json(&key, &result, self.prediction_ttl);
        result
    }

    /// Fitted model for `kind`, restored from the cache when the history
    /// fingerprint matches, otherwise fitted and stored. Either way the path
    /// for `horizon` is checked before the model is returned.
    pub fn fitted_model(
        &self,
        symbol: &str,
        kind: ModelKind,
        prices: &[f64],
        horizon: usize,
    ) -> AppResult<FittedModel> {
        let forecaster = self.inner.clone().with_params(self.load_hyperparams(symbol));
        self.fitted_with(&forecaster, symbol, kind, prices, fingerprint(prices), horizon)
    }

    fn fitted_with(
        &self,
        forecaster: &PriceForecaster,
        symbol: &str,
        kind: ModelKind,
        prices: &[f64],
        fp: u64,
        horizon: usize,
    ) -> AppResult<FittedModel> {
        // Tuned parameters change the fit, so they are folded into the key.
        let params = forecaster.params_for(kind);
        let key = model_key(symbol, kind, fp ^ params_digest(&params));
        match self.cache.get(&key) {
            Ok(Some(bytes)) => match FittedModel::from_bytes(&bytes) {
                Ok(fit) if fit.kind() == kind => {
                    validate_path(kind, &fit.predict(horizon), horizon)?;
                    return Ok(fit);
                }
                Ok(_) => warn!(key = %key, "Cached model kind mismatch; refitting"),
                Err(e) => warn!(key = %key, error = %e, "Cached model unreadable; refitting"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Model cache read failed"),
        }
        let fit = forecaster.fit_one(kind, prices, horizon)?;
        match fit.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(&key, &bytes, self.model_ttl) {
                    warn!(key = %key, error = %e, "Model cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Model encode failed"),
        }
        Ok(fit)
    }

    /// Tuned hyperparameters stored for `symbol`, per model.
    pub fn load_hyperparams(&self, symbol: &str) -> HyperparameterBook {
        let mut book = HyperparameterBook::default();
        for kind in ModelKind::RICH {
            if let Some(params) = self.read_json::<Hyperparameters>(&hyperparams_key(symbol, kind)) {
                book.set(kind, params);
            }
        }
        book
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached entry unreadable");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let res = serde_json::to_vec(value)
            .map_err(crate::error::AppError::from)
            .and_then(|bytes| self.cache.set(key, &bytes, ttl));
        if let Err(e) = res {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

/// Digest of every tuned parameter set; zero when nothing is tuned.
fn book_digest(book: &HyperparameterBook) -> u64 {
    let mut bytes = Vec::new();
    for kind in ModelKind::RICH {
        let params = book.get(kind);
        if params.is_empty() {
            continue;
        }
        bytes.extend_from_slice(kind.name().as_bytes());
        bytes.extend_from_slice(&params_digest(&params).to_le_bytes());
    }
    if bytes.is_empty() {
        0
    } else {
        fnv1a(&bytes)
    }
}

fn params_digest(params: &Hyperparameters) -> u64 {
    if params.is_empty() {
        return 0;
    }
    let mut bytes = Vec::new();
    for (name, value) in params.iter() {
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&value.to_bits().to_le_bytes());
    }
    fnv1a(&bytes)
}
