pub mod anomaly;
pub mod backtest;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod predictor;
pub mod tuning;
