use chrono::{Duration, TimeZone, Utc};

use pricecast::capabilities::{Capabilities, CAPABILITIES};
use pricecast::model::{ForecastResult, PricePoint, PriceSeries, Trend};
use pricecast::predictor::{ModelKind, ModelSelection, PriceForecaster, MIN_ENSEMBLE_POINTS};

fn daily(prices: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    PriceSeries::from_points(prices.iter().enumerate().map(|(i, p)| PricePoint {
        timestamp: start + Duration::days(i as i64),
        price: *p,
    }))
}

fn noisy_trend(n: usize, growth: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 * (growth * t).exp() * (1.0 + 0.02 * (t * 0.9).sin() + 0.01 * (t * 2.3).cos())
        })
        .collect()
}

fn assert_bands_well_formed(result: &ForecastResult) {
    let mut prev_width = 0.0;
    for p in &result.predictions {
        assert!(p.confidence_low >= 0.0, "negative lower bound {:?}", p);
        assert!(p.confidence_low <= p.price && p.price <= p.confidence_high);
        assert!(p.band_width() + 1e-9 >= prev_width, "band narrowed at {:?}", p);
        prev_width = p.band_width();
    }
}

#[test]
fn empty_history_returns_neutral_sentinel() {
    let result = PriceForecaster::default().forecast("BTC", &PriceSeries::empty(), 7);
    assert!(result.predictions.is_empty());
    assert_eq!(result.trend, Trend::Neutral);
    assert_eq!(result.trend_strength, 0.0);
    assert_eq!(result.model_used, "none");
}

#[test]
fn zero_current_price_is_neutral_with_zero_strength() {
    let mut prices = noisy_trend(40, 0.01);
    *prices.last_mut().unwrap() = 0.0;
    let result = PriceForecaster::default().forecast("DEAD", &daily(&prices), 7);
    assert_eq!(result.current_price, 0.0);
    assert_eq!(result.trend, Trend::Neutral);
    assert_eq!(result.trend_strength, 0.0);
    assert_bands_well_formed(&result);
}

#[test]
fn short_history_uses_fallback() {
    let prices = noisy_trend(MIN_ENSEMBLE_POINTS - 1, 0.005);
    let result = PriceForecaster::default().forecast("SHORT", &daily(&prices), 5);
    assert_eq!(result.model_used, "fallback");
    assert_eq!(result.predictions.len(), 5);
    assert_bands_well_formed(&result);
}

#[test]
fn single_point_history_still_forecasts() {
    let result = PriceForecaster::default().forecast("ONE", &daily(&[42.0]), 3);
    assert_eq!(result.model_used, "fallback");
    assert_eq!(result.predicted_prices(), vec![42.0, 42.0, 42.0]);
    assert_bands_well_formed(&result);
}

#[test]
fn long_history_uses_an_ensemble() {
    let prices = noisy_trend(200, 0.004);
    let series = daily(&prices);
    let result = PriceForecaster::default().forecast("ETH", &series, 14);
    assert!(result.model_used.starts_with("ensemble("), "{}", result.model_used);
    assert_eq!(result.predictions.len(), 14);
    assert_bands_well_formed(&result);

    let last = series.last().unwrap().timestamp;
    assert_eq!(result.predictions[0].date, last + Duration::days(1));
    assert_eq!(result.predictions[13].date, last + Duration::days(14));
    assert!(result.support_level <= result.current_price);
    assert!(result.resistance_level >= result.current_price);
}

#[test]
fn minimal_build_ensembles_holt_and_linear() {
    let prices = noisy_trend(120, 0.002);
    let result = PriceForecaster::new(Capabilities::none()).forecast("SPY", &daily(&prices), 7);
    assert_eq!(result.model_used, "ensemble(holt+linear)");
}

#[test]
fn all_rich_strategies_join_with_enough_history() {
    let prices = noisy_trend(300, 0.001);
    let fc = PriceForecaster::new(CAPABILITIES);
    let kinds = fc.candidate_kinds(prices.len(), ModelSelection::Ensemble);
    let expected: Vec<ModelKind> = ModelKind::RICH
        .iter()
        .copied()
        .filter(|k| k.is_available(CAPABILITIES))
        .collect();
    assert_eq!(kinds, expected);
}

#[test]
fn single_selection_reports_that_model() {
    let prices = noisy_trend(80, 0.003);
    let result = PriceForecaster::default().forecast_with(
        "AAPL",
        &daily(&prices),
        7,
        ModelSelection::Single(ModelKind::Linear),
    );
    assert_eq!(result.model_used, "linear");
    assert_bands_well_formed(&result);
}

#[test]
fn failing_single_selection_degrades_to_fallback() {
    // Holt needs ten points.
    let prices = noisy_trend(6, 0.01);
    let result = PriceForecaster::default().forecast_with(
        "TINY",
        &daily(&prices),
        3,
        ModelSelection::Single(ModelKind::Holt),
    );
    assert_eq!(result.model_used, "fallback");
}

#[test]
fn strong_uptrend_is_bullish() {
    let prices: Vec<f64> = (0..90).map(|i| 100.0 * 1.02f64.powi(i)).collect();
    let result = PriceForecaster::default().forecast("MOON", &daily(&prices), 7);
    assert_eq!(result.trend, Trend::Bullish);
    assert!(result.trend_strength > 0.0 && result.trend_strength <= 100.0);
}

#[test]
fn strong_downtrend_is_bearish() {
    let prices: Vec<f64> = (0..90).map(|i| 100.0 * 0.98f64.powi(i)).collect();
    let result = PriceForecaster::default().forecast("RUG", &daily(&prices), 7);
    assert_eq!(result.trend, Trend::Bearish);
}

#[test]
fn bands_stay_well_formed_on_volatile_series() {
    for seed in 1..6u32 {
        let prices: Vec<f64> = (0..150)
            .map(|i| {
                let t = i as f64 * seed as f64;
                (50.0 + 20.0 * (t * 0.37).sin() + 5.0 * (t * 1.7).cos()).max(1.0)
            })
            .collect();
        let result = PriceForecaster::default().forecast("VOL", &daily(&prices), 30);
        assert_eq!(result.predictions.len(), 30);
        assert_bands_well_formed(&result);
    }
}
