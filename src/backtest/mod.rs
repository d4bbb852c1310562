//! Walk-forward evaluation of the forecaster without lookahead.

pub mod metrics;
pub mod walk_forward;

pub use metrics::{compute_metrics, BacktestMetrics, MetricsAccumulator};
pub use walk_forward::{backtest_all_models, min_train_len, walk_forward_backtest};
