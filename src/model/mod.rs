pub mod anomaly;
pub mod asset;
pub mod forecast;
pub mod series;

pub use anomaly::{Anomaly, AnomalyType, DetectionMethod, Severity};
pub use asset::AssetClass;
pub use forecast::{ForecastResult, PredictionPoint, Trend};
pub use series::{PricePoint, PriceSeries};
