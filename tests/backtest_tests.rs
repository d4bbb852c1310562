use chrono::{Duration, TimeZone, Utc};

use pricecast::backtest::{
    backtest_all_models, compute_metrics, min_train_len, walk_forward_backtest, MetricsAccumulator,
};
use pricecast::capabilities::{Capabilities, CAPABILITIES};
use pricecast::model::{PricePoint, PriceSeries};
use pricecast::predictor::{ModelKind, ModelSelection, PriceForecaster};

fn daily(prices: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    PriceSeries::from_points(prices.iter().enumerate().map(|(i, p)| PricePoint {
        timestamp: start + Duration::days(i as i64),
        price: *p,
    }))
}

fn trending(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            50.0 + 0.4 * t + 1.5 * (t * 0.7).sin()
        })
        .collect()
}

#[test]
fn identical_series_score_perfectly() {
    let x = [10.0, 11.0, 10.5, 12.0, 12.5];
    let m = compute_metrics(&x, &x);
    assert_eq!(m.mape, 0.0);
    assert_eq!(m.rmse, 0.0);
    assert_eq!(m.mae, 0.0);
    assert_eq!(m.max_error, 0.0);
    assert!((m.r2_score - 1.0).abs() < 1e-12);
    assert!((m.hit_rate - 100.0).abs() < 1e-12);
    assert_eq!(m.n_samples, 5);
}

#[test]
fn metrics_match_hand_computation() {
    let m = compute_metrics(&[100.0, 200.0], &[110.0, 180.0]);
    // |10|/100 and |20|/200 both 10%.
    assert!((m.mape - 10.0).abs() < 1e-9);
    assert!((m.mae - 15.0).abs() < 1e-9);
    assert!((m.rmse - (250.0f64).sqrt()).abs() < 1e-9);
    assert!((m.max_error - 20.0).abs() < 1e-9);
}

#[test]
fn pooled_segments_do_not_compare_across_boundaries() {
    let mut acc = MetricsAccumulator::default();
    acc.push_segment(Some(10.0), &[11.0, 12.0], &[11.5, 12.5]);
    // Segment boundary: a drop from 12 to 5 is never compared.
    acc.push_segment(Some(4.0), &[5.0], &[3.0]);
    let m = acc.finish();
    assert_eq!(m.n_samples, 3);
    // Three comparisons: two hits in the first segment, one miss in the second.
    assert!((m.hit_rate - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn short_history_yields_empty_metrics() {
    let series = daily(&trending(35));
    let m = walk_forward_backtest(
        &PriceForecaster::default(),
        &series,
        &[7, 14, 30],
        ModelSelection::Ensemble,
    );
    assert!(m.is_empty());
    assert_eq!(m.mape, 0.0);
    assert_eq!(m.hit_rate, 0.0);
}

#[test]
fn pools_every_valid_horizon() {
    let series = daily(&trending(200));
    assert_eq!(min_train_len(200), 66);
    let m = walk_forward_backtest(
        &PriceForecaster::default(),
        &series,
        &[7, 14, 30],
        ModelSelection::Ensemble,
    );
    assert_eq!(m.n_samples, 51);
    assert!(m.mape.is_finite() && m.mape < 20.0);
    assert!((0.0..=100.0).contains(&m.hit_rate));
}

#[test]
fn skips_only_the_horizons_that_do_not_fit() {
    // min_train = max(30, 19) = 30, so the 30-step horizon is dropped.
    let series = daily(&trending(59));
    let m = walk_forward_backtest(
        &PriceForecaster::default(),
        &series,
        &[7, 14, 30],
        ModelSelection::Single(ModelKind::Linear),
    );
    assert_eq!(m.n_samples, 21);
}

#[test]
fn all_models_report_one_entry_each() {
    let series = daily(&trending(45));
    let results = backtest_all_models(&PriceForecaster::default(), &series, &[7, 14]);
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["ensemble", "holt", "linear", "seasonal", "autoregressive", "boosting", "fallback"]
    );
    let get = |name: &str| results.iter().find(|(n, _)| n == name).map(|(_, m)| *m).unwrap();
    assert!(get("boosting").is_empty());
    assert!(get("autoregressive").is_empty());
    assert!(!get("holt").is_empty());
    assert!(!get("fallback").is_empty());
    assert!(!get("ensemble").is_empty());
}

#[test]
fn unavailable_strategies_get_placeholders() {
    let series = daily(&trending(120));
    let forecaster = PriceForecaster::new(Capabilities::none());
    let results = backtest_all_models(&forecaster, &series, &[7]);
    assert_eq!(results.len(), 7);
    for (name, metrics) in &results {
        match name.as_str() {
            "seasonal" | "autoregressive" | "boosting" => assert!(metrics.is_empty(), "{}", name),
            _ => assert_eq!(metrics.n_samples, 7, "{}", name),
        }
    }
}

#[test]
fn every_available_strategy_backtests_on_long_history() {
    let series = daily(&trending(150));
    let forecaster = PriceForecaster::new(CAPABILITIES);
    for kind in ModelKind::RICH.into_iter().filter(|k| k.is_available(CAPABILITIES)) {
        let m = walk_forward_backtest(&forecaster, &series, &[7, 14], ModelSelection::Single(kind));
        assert_eq!(m.n_samples, 21, "{}", kind);
        assert!(m.rmse.is_finite(), "{}", kind);
    }
}
