//! Three-stage anomaly cascade over a price history and a live price.

pub mod detector;
#[cfg(feature = "isolation-forest")]
pub mod isolation_forest;

pub use detector::{isolation_forest_detect, threshold_detect, zscore_detect, AnomalyDetector};
