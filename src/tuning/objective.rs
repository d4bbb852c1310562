use crate::predictor::{strategy_for, Hyperparameters, ModelKind};

/// Training fractions of the history used by the tuning objective.
pub const SPLIT_FRACTIONS: [f64; 3] = [0.6, 0.7, 0.8];
/// Steps predicted after each split.
pub const OBJECTIVE_HORIZON: usize = 7;
/// Score for a trial with no valid split.
pub const SENTINEL_MAPE: f64 = 100.0;

/// Pooled MAPE (percent) of `OBJECTIVE_HORIZON`-step recursive forecasts
/// made at each training split. Splits that are too short or fail to fit are
/// left out; with none left the sentinel is returned.
pub fn objective(kind: ModelKind, prices: &[f64], params: &Hyperparameters) -> f64 {
    let Some(strategy) = strategy_for(kind) else {
        return SENTINEL_MAPE;
    };
    let n = prices.len();
    let mut pct_sum = 0.0;
    let mut pct_n = 0usize;
    for frac in SPLIT_FRACTIONS {
        let split = (n as f64 * frac) as usize;
        if split < strategy.min_points() || split + OBJECTIVE_HORIZON > n {
            continue;
        }
        let Ok(fit) = strategy.fit(&prices[..split], params) else {
            continue;
        };
        let predicted = fit.predict(OBJECTIVE_HORIZON);
        if predicted.iter().any(|p| !p.is_finite()) {
            continue;
        }
        for (a, p) in prices[split..split + OBJECTIVE_HORIZON].iter().zip(&predicted) {
            if *a != 0.0 {
                pct_sum += ((a - p) / a).abs();
                pct_n += 1;
            }
        }
    }
    if pct_n == 0 {
        SENTINEL_MAPE
    } else {
        pct_sum / pct_n as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_scores_sentinel() {
        let prices = vec![100.0; 20];
        assert_eq!(
            objective(ModelKind::Holt, &prices, &Hyperparameters::new()),
            SENTINEL_MAPE
        );
    }

    #[test]
    fn smooth_trend_scores_low() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 * 1.003f64.powi(i)).collect();
        let mape = objective(ModelKind::Holt, &prices, &Hyperparameters::new());
        assert!(mape < 1.0, "mape {}", mape);
    }
}
