use std::time::Duration;

use pricecast::config::{CacheBackend, Config};

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

#[test]
fn parse_default_toml() {
    let config = Config::from_toml_str(DEFAULT_TOML).unwrap();
    assert_eq!(config.providers.crypto_base_url, "https://api.coingecko.com/api/v3");
    assert_eq!(config.providers.request_delay(), Duration::from_secs(6));
    assert_eq!(config.providers.real_estate_proxies.len(), 5);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert_eq!(config.cache.prediction_ttl(), Duration::from_secs(3600));
    assert_eq!(config.cache.model_ttl(), Duration::from_secs(6 * 3600));
    assert_eq!(config.cache.hyperparam_ttl(), Duration::from_secs(7 * 86400));
    assert_eq!(config.forecast.days_ahead, 7);
    assert_eq!(config.forecast.backtest_horizons, vec![7, 14, 30]);
    assert_eq!(config.tuning.n_trials, 50);
    assert_eq!(config.tuning.seed, 42);
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json);
    assert!(config.providers.crypto_api_key.is_none());
}

#[test]
fn optional_sections_take_defaults() {
    let toml_str = r#"
[providers]
crypto_base_url = "http://localhost:1"
equity_base_url = "http://localhost:2"

[cache]
backend = "memory"
prediction_ttl_secs = 60
model_ttl_secs = 120
hyperparam_ttl_secs = 120

[logging]
level = "warn"
"#;
    let config = Config::from_toml_str(toml_str).unwrap();
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.cache.sqlite_path, "data/pricecast_cache.sqlite");
    assert_eq!(config.providers.request_timeout(), Duration::from_secs(15));
    assert_eq!(config.forecast.days_ahead, 7);
    assert_eq!(config.tuning.n_trials, 50);
}

#[test]
fn rejects_hyperparams_expiring_before_models() {
    let toml_str = DEFAULT_TOML.replace("hyperparam_ttl_secs = 604800", "hyperparam_ttl_secs = 60");
    let err = Config::from_toml_str(&toml_str).unwrap_err();
    assert!(err.to_string().contains("hyperparam_ttl_secs"));
}

#[test]
fn rejects_zero_horizon() {
    let toml_str = DEFAULT_TOML.replace("backtest_horizons = [7, 14, 30]", "backtest_horizons = [7, 0]");
    assert!(Config::from_toml_str(&toml_str).is_err());
}

#[test]
fn rejects_unknown_backend() {
    let toml_str = DEFAULT_TOML.replace("backend = \"sqlite\"", "backend = \"redis\"");
    assert!(Config::from_toml_str(&toml_str).is_err());
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.toml"));
}
