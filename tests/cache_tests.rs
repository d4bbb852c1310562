use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use pricecast::cache::{fingerprint, hyperparams_key, model_key, MemoryCache, ModelCache, SqliteCache};
use pricecast::capabilities::CAPABILITIES;
use pricecast::config::{CacheBackend, CacheConfig};
use pricecast::error::AppError;
use pricecast::model::{PricePoint, PriceSeries};
use pricecast::predictor::linear::LinearFit;
use pricecast::predictor::{
    CachedForecaster, FittedModel, Hyperparameters, ModelKind, PriceForecaster,
};

fn daily(prices: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    PriceSeries::from_points(prices.iter().enumerate().map(|(i, p)| PricePoint {
        timestamp: start + ChronoDuration::days(i as i64),
        price: *p,
    }))
}

fn wavy(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            200.0 * (0.002 * t).exp() * (1.0 + 0.03 * (t * 0.8).sin() + 0.01 * (t * 2.9).cos())
        })
        .collect()
}

fn cache_config() -> CacheConfig {
    CacheConfig {
        backend: CacheBackend::Memory,
        sqlite_path: String::new(),
        prediction_ttl_secs: 3600,
        model_ttl_secs: 21600,
        hyperparam_ttl_secs: 604800,
    }
}

#[test]
fn cached_model_reproduces_fresh_predictions() {
    let prices = wavy(150);
    let cache = MemoryCache::new();
    let forecaster = PriceForecaster::new(CAPABILITIES);
    for kind in ModelKind::RICH.into_iter().filter(|k| k.is_available(CAPABILITIES)) {
        let fresh = forecaster.fit_one(kind, &prices, 14).unwrap();
        let key = model_key("SOL", kind, fingerprint(&prices));
        cache
            .set(&key, &fresh.to_bytes().unwrap(), Duration::from_secs(60))
            .unwrap();
        let restored = FittedModel::from_bytes(&cache.get(&key).unwrap().unwrap()).unwrap();
        assert_eq!(restored, fresh, "{}", kind);
        assert_eq!(restored.predict(14), fresh.predict(14), "{}", kind);
    }
}

#[test]
fn cached_forecaster_serves_repeat_requests_from_cache() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store.clone(), &cache_config());
    let series = daily(&wavy(120));
    let first = cached.forecast("ADA", &series, 7);
    let second = cached.forecast("ADA", &series, 7);
    assert_eq!(first, second);

    // Direct computation agrees with the cached path.
    let direct = PriceForecaster::new(CAPABILITIES).forecast("ADA", &series, 7);
    assert_eq!(direct.predictions, first.predictions);
    assert_eq!(direct.model_used, first.model_used);
}

#[test]
fn fitted_model_round_trips_through_cached_forecaster() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &cache_config());
    let prices = wavy(100);
    let a = cached.fitted_model("DOT", ModelKind::Holt, &prices, 7).unwrap();
    let b = cached.fitted_model("DOT", ModelKind::Holt, &prices, 7).unwrap();
    assert_eq!(a.predict(7), b.predict(7));
}

#[test]
fn stored_hyperparameters_reach_the_forecaster() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let params = Hyperparameters::new().with("alpha", 0.9).with("beta", 0.3);
    store
        .set(
            &hyperparams_key("LINK", ModelKind::Holt),
            &serde_json::to_vec(&params).unwrap(),
            Duration::from_secs(60),
        )
        .unwrap();
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &cache_config());
    let book = cached.load_hyperparams("link");
    assert_eq!(book.get(ModelKind::Holt), params);
    assert!(book.get(ModelKind::Linear).is_empty());

    let prices = wavy(80);
    let tuned = cached.fitted_model("LINK", ModelKind::Holt, &prices, 7).unwrap();
    let default = PriceForecaster::new(CAPABILITIES)
        .fit_one(ModelKind::Holt, &prices, 7)
        .unwrap();
    assert_ne!(tuned, default);
}

#[test]
fn unreadable_cache_entry_is_refitted() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let prices = wavy(60);
    store
        .set(
            &model_key("XRP", ModelKind::Linear, fingerprint(&prices)),
            b"not a model",
            Duration::from_secs(60),
        )
        .unwrap();
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &cache_config());
    assert!(cached.fitted_model("XRP", ModelKind::Linear, &prices, 7).is_ok());
}

#[test]
fn cached_model_is_checked_against_the_requested_horizon() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let prices = wavy(60);
    // Finite over a week, overflows long before 90 steps.
    let steep = FittedModel::Linear(LinearFit {
        intercept: 100f64.ln(),
        slope: 20.0,
        last_index: 0.0,
        last_residual: 0.0,
        sigma: 0.01,
    });
    assert!(steep.predict(7).iter().all(|p| p.is_finite()));
    store
        .set(
            &model_key("XRP", ModelKind::Linear, fingerprint(&prices)),
            &steep.to_bytes().unwrap(),
            Duration::from_secs(60),
        )
        .unwrap();
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &cache_config());
    assert_eq!(cached.fitted_model("XRP", ModelKind::Linear, &prices, 7).unwrap(), steep);
    assert!(matches!(
        cached.fitted_model("XRP", ModelKind::Linear, &prices, 90),
        Err(AppError::ModelFit { .. })
    ));
}

#[test]
fn newly_tuned_parameters_bypass_the_cached_prediction() {
    let store: Arc<dyn ModelCache> = Arc::new(MemoryCache::new());
    let cached = CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store.clone(), &cache_config());
    let series = daily(&wavy(120));
    let before = cached.forecast("AVAX", &series, 7);

    let params = Hyperparameters::new().with("alpha", 0.9).with("beta", 0.3).with("damping", 0.9);
    store
        .set(
            &hyperparams_key("AVAX", ModelKind::Holt),
            &serde_json::to_vec(&params).unwrap(),
            Duration::from_secs(60),
        )
        .unwrap();
    let after = cached.forecast("AVAX", &series, 7);
    assert_ne!(before.predictions, after.predictions);
    assert_eq!(cached.forecast("AVAX", &series, 7), after);
}

#[test]
fn sqlite_cache_set_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open(dir.path().join("nested/cache.sqlite")).unwrap();
    cache.set("a", b"one", Duration::from_secs(60)).unwrap();
    cache.set("a", b"two", Duration::from_secs(60)).unwrap();
    assert_eq!(cache.get("a").unwrap().as_deref(), Some(&b"two"[..]));
    cache.delete("a").unwrap();
    assert_eq!(cache.get("a").unwrap(), None);
}

#[test]
fn sqlite_cache_ignores_and_purges_expired_rows() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.set("old", b"x", Duration::ZERO).unwrap();
    cache.set("new", b"y", Duration::from_secs(60)).unwrap();
    assert_eq!(cache.get("old").unwrap(), None);
    assert_eq!(cache.purge_expired().unwrap(), 1);
    assert!(cache.get("new").unwrap().is_some());
}

#[test]
fn sqlite_cache_persists_across_reopen_and_rejects_use_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");
    {
        let cache = SqliteCache::open(&path).unwrap();
        cache.set("k", b"v", Duration::from_secs(60)).unwrap();
        cache.close().unwrap();
        assert!(matches!(cache.get("k"), Err(AppError::CacheClosed(_))));
    }
    let reopened = SqliteCache::open(&path).unwrap();
    assert_eq!(reopened.get("k").unwrap().as_deref(), Some(&b"v"[..]));
}
