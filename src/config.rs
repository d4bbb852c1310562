use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub crypto_base_url: String,
    pub equity_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Minimum delay between sequential requests during a bulk refresh.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_real_estate_proxies")]
    pub real_estate_proxies: Vec<String>,
    #[serde(skip)]
    pub crypto_api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    pub prediction_ttl_secs: u64,
    pub model_ttl_secs: u64,
    pub hyperparam_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub days_ahead: usize,
    pub backtest_horizons: Vec<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            days_ahead: 7,
            backtest_horizons: vec![7, 14, 30],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    pub n_trials: usize,
    pub seed: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            n_trials: 50,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_request_delay_ms() -> u64 {
    6_000
}

fn default_sqlite_path() -> String {
    "data/pricecast_cache.sqlite".to_string()
}

fn default_real_estate_proxies() -> Vec<String> {
    ["VNQ", "IYR", "SCHH", "XLRE", "RWR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ProvidersConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl CacheConfig {
    pub fn prediction_ttl(&self) -> Duration {
        Duration::from_secs(self.prediction_ttl_secs)
    }

    pub fn model_ttl(&self) -> Duration {
        Duration::from_secs(self.model_ttl_secs)
    }

    pub fn hyperparam_ttl(&self) -> Duration {
        Duration::from_secs(self.hyperparam_ttl_secs)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = path.as_ref();
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        config.providers.crypto_api_key = std::env::var("COINGECKO_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.cache;
        if c.prediction_ttl_secs == 0 || c.model_ttl_secs == 0 || c.hyperparam_ttl_secs == 0 {
            bail!("cache TTLs must be > 0");
        }
        if c.hyperparam_ttl_secs < c.model_ttl_secs {
            bail!(
                "cache.hyperparam_ttl_secs ({}) must be >= cache.model_ttl_secs ({})",
                c.hyperparam_ttl_secs,
                c.model_ttl_secs
            );
        }
        if self.forecast.days_ahead == 0 {
            bail!("forecast.days_ahead must be > 0");
        }
        if self.forecast.backtest_horizons.is_empty()
            || self.forecast.backtest_horizons.contains(&0)
        {
            bail!("forecast.backtest_horizons must be non-empty and positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[providers]
crypto_base_url = "https://api.coingecko.com/api/v3"
equity_base_url = "https://query1.finance.yahoo.com/v8/finance/chart"
request_delay_ms = 3000

[cache]
backend = "sqlite"
prediction_ttl_secs = 3600
model_ttl_secs = 21600
hyperparam_ttl_secs = 604800

[forecast]
days_ahead = 14
backtest_horizons = [7, 30]

[logging]
level = "debug"
"#;

    #[test]
    fn parse_sample_toml() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.forecast.days_ahead, 14);
        assert_eq!(config.forecast.backtest_horizons, vec![7, 30]);
        assert_eq!(config.providers.request_delay(), Duration::from_secs(3));
        assert_eq!(config.providers.request_timeout_secs, 15);
        assert_eq!(config.providers.real_estate_proxies[0], "VNQ");
        assert_eq!(config.tuning.n_trials, 50);
        assert!(!config.logging.json);
    }

    #[test]
    fn rejects_hyperparam_ttl_shorter_than_model_ttl() {
        let bad = SAMPLE.replace("hyperparam_ttl_secs = 604800", "hyperparam_ttl_secs = 60");
        assert!(Config::from_toml_str(&bad).is_err());
    }

    #[test]
    fn rejects_zero_horizon() {
        let bad = SAMPLE.replace("[7, 30]", "[0, 30]");
        assert!(Config::from_toml_str(&bad).is_err());
    }
}
