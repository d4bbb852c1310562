//! Regression error metrics for forecast evaluation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Mean absolute percentage error over non-zero actuals, in percent.
    pub mape: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2_score: f64,
    /// Share of steps whose predicted direction matched the actual one, in percent.
    pub hit_rate: f64,
    pub max_error: f64,
    pub n_samples: usize,
}

impl BacktestMetrics {
    /// Placeholder for an evaluation that produced no samples.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }
}

/// Metrics over aligned actual/predicted values. Extra values on the longer
/// side are ignored.
pub fn compute_metrics(actual: &[f64], predicted: &[f64]) -> BacktestMetrics {
    let mut acc = MetricsAccumulator::default();
    acc.push_segment(None, actual, predicted);
    acc.finish()
}

/// Pools several forecast segments into one metrics computation. Directional
/// hits are counted within a segment only, so a segment boundary never
/// produces a spurious delta.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    actual: Vec<f64>,
    predicted: Vec<f64>,
    hits: usize,
    directions: usize,
}

impl MetricsAccumulator {
    /// Add one segment. With an `anchor` (the last known price before the
    /// segment) the first step also contributes a direction comparison.
    pub fn push_segment(&mut self, anchor: Option<f64>, actual: &[f64], predicted: &[f64]) {
        let n = actual.len().min(predicted.len());
        let actual = &actual[..n];
        let predicted = &predicted[..n];
        self.actual.extend_from_slice(actual);
        self.predicted.extend_from_slice(predicted);

        let mut prev = anchor.map(|a| (a, a));
        for (a, p) in actual.iter().zip(predicted) {
            if let Some((prev_a, prev_p)) = prev {
                self.directions += 1;
                if sign(a - prev_a) == sign(p - prev_p) {
                    self.hits += 1;
                }
            }
            prev = Some((*a, *p));
        }
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn finish(&self) -> BacktestMetrics {
        let n = self.actual.len();
        if n == 0 {
            return BacktestMetrics::empty();
        }
        let nf = n as f64;

        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut max_error = 0.0f64;
        let mut pct_sum = 0.0;
        let mut pct_n = 0usize;
        for (a, p) in self.actual.iter().zip(&self.predicted) {
            let err = a - p;
            abs_sum += err.abs();
            sq_sum += err * err;
            max_error = max_error.max(err.abs());
            if *a != 0.0 {
                pct_sum += (err / a).abs();
                pct_n += 1;
            }
        }
        let mape = if pct_n > 0 {
            pct_sum / pct_n as f64 * 100.0
        } else {
            0.0
        };

        let mean = self.actual.iter().sum::<f64>() / nf;
        let ss_tot: f64 = self.actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2_score = if ss_tot > f64::EPSILON {
            1.0 - sq_sum / ss_tot
        } else if sq_sum <= f64::EPSILON {
            1.0
        } else {
            0.0
        };

        let hit_rate = if self.directions == 0 || n < 2 {
            50.0
        } else {
            self.hits as f64 / self.directions as f64 * 100.0
        };

        BacktestMetrics {
            mape,
            rmse: (sq_sum / nf).sqrt(),
            mae: abs_sum / nf,
            r2_score,
            hit_rate,
            max_error,
            n_samples: n,
        }
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}
