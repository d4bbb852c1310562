use crate::predictor::{Hyperparameters, ModelKind};

/// One tunable parameter and its search range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamAxis {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    /// Sampled values are rounded to whole numbers.
    pub integer: bool,
}

const fn real(name: &'static str, min: f64, max: f64) -> ParamAxis {
    ParamAxis {
        name,
        min,
        max,
        integer: false,
    }
}

const fn int(name: &'static str, min: f64, max: f64) -> ParamAxis {
    ParamAxis {
        name,
        min,
        max,
        integer: true,
    }
}

const HOLT: &[ParamAxis] = &[
    real("alpha", 0.05, 0.95),
    real("beta", 0.01, 0.5),
    real("damping", 0.85, 1.0),
];

const SEASONAL: &[ParamAxis] = &[
    real("alpha", 0.05, 0.9),
    real("beta", 0.01, 0.3),
    real("gamma", 0.01, 0.5),
];

const AUTOREGRESSIVE: &[ParamAxis] = &[int("lags", 1.0, 10.0), real("ridge", 1e-4, 1.0)];

const BOOSTING: &[ParamAxis] = &[
    int("n_trees", 20.0, 150.0),
    real("learning_rate", 0.02, 0.3),
    int("max_depth", 2.0, 5.0),
    int("lags", 2.0, 10.0),
];

/// Parameters searched for `kind`; empty for models without a search space.
pub fn search_space(kind: ModelKind) -> &'static [ParamAxis] {
    match kind {
        ModelKind::Holt => HOLT,
        ModelKind::Seasonal => SEASONAL,
        ModelKind::Autoregressive => AUTOREGRESSIVE,
        ModelKind::Boosting => BOOSTING,
        ModelKind::Fallback | ModelKind::Linear => &[],
    }
}

/// Parameters returned when a search is not run:
///
/// | model          | parameters                                             |
/// |----------------|--------------------------------------------------------|
/// | holt           | alpha 0.3, beta 0.1, damping 0.98                      |
/// | seasonal       | period 7, alpha 0.3, beta 0.05, gamma 0.1              |
/// | autoregressive | lags 5, ridge 0.01                                     |
/// | boosting       | n_trees 50, learning_rate 0.1, max_depth 3, lags 5     |
/// | linear         | window 90                                              |
/// | fallback       | window 14                                              |
pub fn default_params(kind: ModelKind) -> Hyperparameters {
    let p = Hyperparameters::new();
    match kind {
        ModelKind::Holt => p.with("alpha", 0.3).with("beta", 0.1).with("damping", 0.98),
        ModelKind::Seasonal => p
            .with("period", 7.0)
            .with("alpha", 0.3)
            .with("beta", 0.05)
            .with("gamma", 0.1),
        ModelKind::Autoregressive => p.with("lags", 5.0).with("ridge", 0.01),
        ModelKind::Boosting => p
            .with("n_trees", 50.0)
            .with("learning_rate", 0.1)
            .with("max_depth", 3.0)
            .with("lags", 5.0),
        ModelKind::Linear => p.with("window", 90.0),
        ModelKind::Fallback => p.with("window", 14.0),
    }
}
