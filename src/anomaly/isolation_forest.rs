//! Isolation forest over scalar observations.
//!
//! Scores follow the usual convention for decision functions: the raw
//! anomaly score `2^(-E[h(x)]/c(psi))` is negated and shifted by its value at
//! the contamination quantile of the training data, so negative means
//! anomalous.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_SUBSAMPLE: usize = 256;
pub const DEFAULT_CONTAMINATION: f64 = 0.05;
pub const DEFAULT_SEED: u64 = 42;

const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone)]
enum Node {
    Split {
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(data: &[f64], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(data, 0, max_depth, rng),
        }
    }

    fn build_node(data: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || data.len() <= 1 {
            return Node::Leaf { size: data.len() };
        }
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < 1e-12 {
            return Node::Leaf { size: data.len() };
        }
        let value = rng.gen_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = data.iter().partition(|x| **x < value);
        Node::Split {
            value,
            left: Box::new(Self::build_node(&left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path(*size),
                Node::Split { value, left, right } => {
                    node = if x < *value { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` items.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit with the default tree count, subsample size, contamination and seed.
    pub fn fit(data: &[f64]) -> Option<Self> {
        Self::fit_with(
            data,
            DEFAULT_TREES,
            DEFAULT_SUBSAMPLE,
            DEFAULT_CONTAMINATION,
            DEFAULT_SEED,
        )
    }

    /// `None` when there is nothing finite to train on.
    pub fn fit_with(
        data: &[f64],
        n_trees: usize,
        subsample: usize,
        contamination: f64,
        seed: u64,
    ) -> Option<Self> {
        let data: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        if data.is_empty() || n_trees == 0 {
            return None;
        }
        let sample_size = subsample.clamp(1, data.len());
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..n_trees)
            .map(|_| {
                let sample: Vec<f64> = rand::seq::index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| data[i])
                    .collect();
                IsolationTree::build(&sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };
        let mut scores: Vec<f64> = data.iter().map(|x| forest.score_sample(*x)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        forest.offset = quantile(&scores, contamination.clamp(0.0, 0.5));
        Some(forest)
    }

    /// Negated raw anomaly score in [-1, 0]; lower is more anomalous.
    pub fn score_sample(&self, x: f64) -> f64 {
        let c = average_path(self.sample_size);
        if c <= 0.0 || self.trees.is_empty() {
            return -0.5;
        }
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean_path / c))
    }

    /// Shifted score; negative values are outliers.
    pub fn decision_function(&self, x: f64) -> f64 {
        self.score_sample(x) - self.offset
    }

    pub fn is_outlier(&self, x: f64) -> bool {
        self.decision_function(x) < 0.0
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
