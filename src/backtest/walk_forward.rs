use tracing::{debug, info, warn};

use crate::model::PriceSeries;
use crate::predictor::{ModelKind, ModelSelection, PriceForecaster};

use super::metrics::{BacktestMetrics, MetricsAccumulator};

/// Training splits shorter than this are never evaluated.
pub const MIN_TRAIN_POINTS: usize = 30;

/// Minimum training length for a history of `n` points: max(30, n/3).
pub fn min_train_len(n: usize) -> usize {
    MIN_TRAIN_POINTS.max(n / 3)
}

/// For each horizon `h`, train on all but the last `h` points and score the
/// forecast against them. Every valid horizon is pooled into one metrics
/// computation. Horizons whose training split is too short are skipped; if
/// none qualify the result is empty.
pub fn walk_forward_backtest(
    forecaster: &PriceForecaster,
    series: &PriceSeries,
    horizons: &[usize],
    selection: ModelSelection,
) -> BacktestMetrics {
    let prices = series.prices();
    let n = prices.len();
    let min_train = min_train_len(n);
    let mut acc = MetricsAccumulator::default();

    for &h in horizons {
        if h == 0 || h >= n || n - h < min_train {
            debug!(model = %selection, horizon = h, points = n, "Skipping horizon: training split too short");
            continue;
        }
        let train_len = n - h;
        let train = series.truncated(train_len);
        let predicted = match selection {
            ModelSelection::Ensemble => forecaster
                .forecast_with("backtest", &train, h, selection)
                .predicted_prices(),
            ModelSelection::Single(kind) => {
                match forecaster.fit_one(kind, &prices[..train_len], h) {
                    Ok(fit) => fit.predict(h),
                    Err(e) => {
                        warn!(model = %kind, horizon = h, error = %e, "Strategy failed during backtest");
                        continue;
                    }
                }
            }
        };
        if predicted.len() != h {
            continue;
        }
        acc.push_segment(Some(prices[train_len - 1]), &prices[train_len..], &predicted);
    }
    acc.finish()
}

/// Backtest the ensemble and then each strategy on its own. A strategy that
/// is unavailable, lacks data or fails gets an empty placeholder entry.
pub fn backtest_all_models(
    forecaster: &PriceForecaster,
    series: &PriceSeries,
    horizons: &[usize],
) -> Vec<(String, BacktestMetrics)> {
    let n = series.len();
    let caps = forecaster.capabilities();
    let mut entries = Vec::with_capacity(ModelKind::RICH.len() + 2);
    entries.push(ModelSelection::Ensemble);
    entries.extend(ModelKind::RICH.iter().map(|k| ModelSelection::Single(*k)));
    entries.push(ModelSelection::Single(ModelKind::Fallback));

    entries
        .into_iter()
        .map(|selection| {
            let runnable = match selection {
                ModelSelection::Ensemble => true,
                ModelSelection::Single(kind) => kind.is_available(caps) && n >= kind.min_points(),
            };
            let metrics = if runnable {
                walk_forward_backtest(forecaster, series, horizons, selection)
            } else {
                debug!(model = %selection, points = n, "Strategy not runnable; empty metrics");
                BacktestMetrics::empty()
            };
            info!(
                model = %selection,
                mape = metrics.mape,
                hit_rate = metrics.hit_rate,
                samples = metrics.n_samples,
                "Backtest complete"
            );
            (selection.name().to_string(), metrics)
        })
        .collect()
}
