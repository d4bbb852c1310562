//! Gradient-boosted regression trees over lagged log returns.
//!
//! Trees live in a flat arena so a fitted ensemble serializes as plain data.
//! Split search is exhaustive over candidate quantiles, so fitting is
//! deterministic for a given history and parameter set.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::series::{log_returns, mean_std};

use super::{require_points, FittedModel, ForecastModel, Hyperparameters, ModelKind};

pub const DEFAULT_TREES: usize = 50;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_DEPTH: usize = 3;
pub const DEFAULT_LAGS: usize = 5;
const MIN_LEAF: usize = 5;
const SPLIT_CANDIDATES: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct BoostingModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    fn fit(rows: &[Vec<f64>], targets: &[f64], max_depth: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.grow(rows, targets, indices, max_depth);
        tree
    }

    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        depth_left: usize,
    ) -> usize {
        let value = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len().max(1) as f64;
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { value });
        if depth_left == 0 || indices.len() < 2 * MIN_LEAF {
            return slot;
        }
        let Some((feature, threshold)) = best_split(rows, targets, &indices) else {
            return slot;
        };
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][feature] <= threshold);
        let left = self.grow(rows, targets, left_idx, depth_left - 1);
        let right = self.grow(rows, targets, right_idx, depth_left - 1);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }
}

/// Split minimising the summed squared error of both children.
fn best_split(rows: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> Option<(usize, f64)> {
    let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
    let parent_sse = sse(indices.iter().map(|&i| targets[i]));
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..n_features {
        let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature]).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let step = (values.len() / SPLIT_CANDIDATES).max(1);
        for k in (MIN_LEAF..values.len().saturating_sub(MIN_LEAF)).step_by(step) {
            let threshold = values[k - 1];
            if values[k] <= threshold {
                continue;
            }
            let left = indices
                .iter()
                .filter(|&&i| rows[i][feature] <= threshold)
                .map(|&i| targets[i]);
            let right = indices
                .iter()
                .filter(|&&i| rows[i][feature] > threshold)
                .map(|&i| targets[i]);
            let score = sse(left) + sse(right);
            if score < parent_sse && best.map_or(true, |(_, _, s)| score < s) {
                best = Some((feature, threshold, score));
            }
        }
    }
    best.map(|(f, t, _)| (f, t))
}

fn sse(values: impl Iterator<Item = f64>) -> f64 {
    let v: Vec<f64> = values.collect();
    if v.is_empty() {
        return 0.0;
    }
    let mean = v.iter().sum::<f64>() / v.len() as f64;
    v.iter().map(|x| (x - mean).powi(2)).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedFit {
    pub base: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
    pub lags: usize,
    pub last_price: f64,
    /// Most recent returns, newest first.
    pub recent: Vec<f64>,
    /// Largest absolute return seen in training; predicted returns are
    /// clamped to it so the recursion cannot run away.
    pub max_abs_return: f64,
    pub sigma: f64,
}

impl BoostedFit {
    fn predict_return(&self, lags: &[f64]) -> f64 {
        let x = features(lags);
        self.base
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(&x))
                .sum::<f64>()
    }

    /// Recursive forecast feeding each predicted return back as the newest lag.
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let mut lags = self.recent.clone();
        let mut log_price = self.last_price.ln();
        let cap = self.max_abs_return;
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let r = self.predict_return(&lags).clamp(-cap, cap);
            log_price += r;
            out.push(log_price.exp());
            lags.insert(0, r);
            lags.truncate(self.lags);
        }
        out
    }
}

/// Lags (newest first) followed by their mean.
fn features(lags: &[f64]) -> Vec<f64> {
    let mut x = lags.to_vec();
    let mean = if lags.is_empty() {
        0.0
    } else {
        lags.iter().sum::<f64>() / lags.len() as f64
    };
    x.push(mean);
    x
}

impl ForecastModel for BoostingModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Boosting
    }

    fn fit(&self, prices: &[f64], params: &Hyperparameters) -> AppResult<FittedModel> {
        require_points(self.kind(), prices)?;
        let n_trees = params.get_usize_or("n_trees", DEFAULT_TREES).clamp(1, 500);
        let learning_rate = params
            .get_or("learning_rate", DEFAULT_LEARNING_RATE)
            .clamp(0.001, 1.0);
        let max_depth = params.get_usize_or("max_depth", DEFAULT_DEPTH).clamp(1, 8);
        let lags = params.get_usize_or("lags", DEFAULT_LAGS).clamp(1, 20);

        let returns = log_returns(prices);
        if returns.len() < lags + 2 * MIN_LEAF {
            return Err(AppError::InsufficientData {
                required: lags + 2 * MIN_LEAF + 1,
                actual: prices.len(),
            });
        }
        let mut rows = Vec::with_capacity(returns.len() - lags);
        let mut targets = Vec::with_capacity(returns.len() - lags);
        for t in lags..returns.len() {
            let window: Vec<f64> = returns[t - lags..t].iter().rev().copied().collect();
            rows.push(features(&window));
            targets.push(returns[t]);
        }

        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut current = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(n_trees);
        for _ in 0..n_trees {
            let residuals: Vec<f64> = targets.iter().zip(&current).map(|(y, p)| y - p).collect();
            let tree = RegressionTree::fit(&rows, &residuals, max_depth);
            for (p, row) in current.iter_mut().zip(&rows) {
                *p += learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        let rms = (targets
            .iter()
            .zip(&current)
            .map(|(y, p)| (y - p).powi(2))
            .sum::<f64>()
            / targets.len() as f64)
            .sqrt();
        // In-sample error understates out-of-sample spread.
        let (_, ret_std) = mean_std(&returns);
        let sigma = rms.max(0.5 * ret_std);
        if !sigma.is_finite() || !base.is_finite() {
            return Err(AppError::fit("boosting", "non-finite training loss"));
        }

        Ok(FittedModel::Boosting(BoostedFit {
            base,
            learning_rate,
            trees,
            lags,
            last_price: *prices.last().unwrap_or(&0.0),
            recent: returns[returns.len() - lags..].iter().rev().copied().collect(),
            max_abs_return: returns.iter().fold(0.0, |m, r| m.max(r.abs())),
            sigma,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag(n: usize) -> Vec<f64> {
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                price *= if i % 2 == 0 { 1.02 } else { 0.985 };
                price
            })
            .collect()
    }

    #[test]
    fn fit_is_deterministic() {
        let prices = zigzag(120);
        let a = BoostingModel.fit(&prices, &Hyperparameters::new()).unwrap();
        let b = BoostingModel.fit(&prices, &Hyperparameters::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(7), b.predict(7));
    }

    #[test]
    fn learns_alternating_returns() {
        let prices = zigzag(160);
        let fit = BoostingModel.fit(&prices, &Hyperparameters::new()).unwrap();
        let path = fit.predict(2);
        let last = *prices.last().unwrap();
        // Last step was index 159 (odd, a drop), so the next move should be up.
        assert!(path[0] > last);
        assert!(path[1] < path[0]);
    }

    #[test]
    fn tree_respects_min_leaf() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let tree = RegressionTree::fit(&rows, &targets, 3);
        assert_eq!(tree.nodes.len(), 1);
    }
}
