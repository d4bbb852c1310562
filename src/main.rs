use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use pricecast::anomaly::AnomalyDetector;
use pricecast::backtest::backtest_all_models;
use pricecast::cache::{MemoryCache, ModelCache, SqliteCache};
use pricecast::capabilities::CAPABILITIES;
use pricecast::config::{CacheBackend, Config};
use pricecast::fetcher::{HistoricalDataFetcher, HistoryRequest};
use pricecast::model::{AssetClass, ForecastResult, PriceSeries};
use pricecast::predictor::{CachedForecaster, ModelKind, PriceForecaster};
use pricecast::tuning::{store_tuned, HyperparameterTuner};

#[derive(Debug, Parser)]
#[command(name = "pricecast", version, about = "Forecast, backtest, tune and scan asset prices")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Forecast future prices with confidence bands and a trend call.
    Forecast {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "crypto")]
        asset: AssetClass,
        /// Days to forecast; defaults to `[forecast].days_ahead`.
        #[arg(long)]
        days: Option<usize>,
        #[arg(long, default_value_t = 365)]
        history: u32,
    },
    /// Walk-forward backtest of the ensemble and each strategy.
    Backtest {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "crypto")]
        asset: AssetClass,
        #[arg(long, default_value_t = 365)]
        history: u32,
    },
    /// Search hyperparameters for one model and store them in the cache.
    Tune {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "crypto")]
        asset: AssetClass,
        #[arg(long)]
        model: ModelKind,
        #[arg(long)]
        trials: Option<usize>,
        #[arg(long, default_value_t = 365)]
        history: u32,
    },
    /// Check the latest price for abnormal movement.
    Detect {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "crypto")]
        asset: AssetClass,
        /// Live price; defaults to the latest fetched close.
        #[arg(long)]
        current_price: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        avg_buy_price: f64,
        #[arg(long, default_value_t = 90)]
        history: u32,
    },
    /// Fetch and forecast many symbols sequentially, warming the cache.
    Refresh {
        /// Entries as SYMBOL:ASSET, e.g. BTC:crypto,AAPL:stock.
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        #[arg(long, default_value_t = 365)]
        history: u32,
    },
}

#[derive(Debug, Serialize)]
struct RefreshEntry {
    symbol: String,
    asset: AssetClass,
    points: usize,
    forecast: ForecastResult,
}

fn parse_request(raw: &str) -> Result<HistoryRequest> {
    let (symbol, asset) = raw
        .split_once(':')
        .with_context(|| format!("expected SYMBOL:ASSET, got '{}'", raw))?;
    let asset: AssetClass = asset.parse()?;
    Ok(HistoryRequest::new(symbol.trim(), asset))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(&config.logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!(
        capabilities = ?CAPABILITIES,
        cache = ?config.cache.backend,
        "Starting pricecast"
    );

    let fetcher = HistoricalDataFetcher::new(&config.providers)
        .context("failed to build HTTP client")?;
    let (store, sqlite): (Arc<dyn ModelCache>, Option<Arc<SqliteCache>>) =
        match config.cache.backend {
            CacheBackend::Memory => (Arc::new(MemoryCache::new()), None),
            CacheBackend::Sqlite => {
                let c = Arc::new(
                    SqliteCache::open(&config.cache.sqlite_path).with_context(|| {
                        format!("failed to open cache {}", config.cache.sqlite_path)
                    })?,
                );
                if let Ok(purged) = c.purge_expired() {
                    tracing::debug!(purged, "Purged expired cache rows");
                }
                (c.clone(), Some(c))
            }
        };

    let outcome = run(cli.command, &config, &fetcher, store).await;

    if let Some(sqlite) = sqlite {
        sqlite.close().context("failed to close cache")?;
    }
    outcome
}

async fn run(
    command: Command,
    config: &Config,
    fetcher: &HistoricalDataFetcher,
    store: Arc<dyn ModelCache>,
) -> Result<()> {
    match command {
        Command::Forecast {
            symbol,
            asset,
            days,
            history,
        } => {
            let series = fetcher.get_history(&symbol, asset, history).await;
            let days = days.unwrap_or(config.forecast.days_ahead);
            let forecaster =
                CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &config.cache);
            let result = tokio::task::spawn_blocking(move || {
                forecaster.forecast(&symbol, &series, days)
            })
            .await
            .context("forecast task panicked")?;
            print_json(&result)
        }
        Command::Backtest {
            symbol,
            asset,
            history,
        } => {
            let series = fetcher.get_history(&symbol, asset, history).await;
            let horizons = config.forecast.backtest_horizons.clone();
            let params = CachedForecaster::new(
                PriceForecaster::new(CAPABILITIES),
                store,
                &config.cache,
            )
            .load_hyperparams(&symbol);
            let forecaster = PriceForecaster::new(CAPABILITIES).with_params(params);
            let results = tokio::task::spawn_blocking(move || {
                backtest_all_models(&forecaster, &series, &horizons)
            })
            .await
            .context("backtest task panicked")?;
            let report: Vec<serde_json::Value> = results
                .into_iter()
                .map(|(model, metrics)| serde_json::json!({ "model": model, "metrics": metrics }))
                .collect();
            print_json(&report)
        }
        Command::Tune {
            symbol,
            asset,
            model,
            trials,
            history,
        } => {
            let series = fetcher.get_history(&symbol, asset, history).await;
            let tuner = HyperparameterTuner::new(CAPABILITIES, &config.tuning);
            let outcome = tokio::task::spawn_blocking(move || tuner.tune(model, &series, trials))
                .await
                .context("tuning task panicked")?;
            let stored = store_tuned(
                store.as_ref(),
                &symbol,
                &outcome,
                config.cache.hyperparam_ttl(),
            )
            .context("failed to store tuned hyperparameters")?;
            tracing::info!(symbol = %symbol, model = %model, stored, "Tuning stored");
            print_json(&outcome)
        }
        Command::Detect {
            symbol,
            asset,
            current_price,
            avg_buy_price,
            history,
        } => {
            let series = fetcher.get_history(&symbol, asset, history).await;
            let (past, live) = match current_price {
                Some(p) => (series, p),
                None => {
                    let live = series.last_price().unwrap_or(0.0);
                    (series.truncated(series.len().saturating_sub(1)), live)
                }
            };
            let detector = AnomalyDetector::new(CAPABILITIES);
            let anomaly = tokio::task::spawn_blocking(move || {
                detector.detect(&symbol, asset, &past, live, avg_buy_price)
            })
            .await
            .context("detection task panicked")?;
            print_json(&anomaly)
        }
        Command::Refresh { symbols, history } => {
            let requests = symbols
                .iter()
                .map(|s| parse_request(s))
                .collect::<Result<Vec<_>>>()?;
            let fetched = fetcher.refresh_many(&requests, history).await;
            let days = config.forecast.days_ahead;
            let forecaster =
                CachedForecaster::new(PriceForecaster::new(CAPABILITIES), store, &config.cache);
            let entries = tokio::task::spawn_blocking(move || {
                fetched
                    .into_iter()
                    .map(|(req, series): (HistoryRequest, PriceSeries)| RefreshEntry {
                        forecast: forecaster.forecast(&req.symbol, &series, days),
                        points: series.len(),
                        symbol: req.symbol,
                        asset: req.asset,
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .context("refresh task panicked")?;
            print_json(&entries)
        }
    }
}
