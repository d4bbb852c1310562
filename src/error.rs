use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider {provider} rate limited the request")]
    RateLimited { provider: &'static str },

    #[error("provider {provider} error: {reason}")]
    Provider { provider: &'static str, reason: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("cache store error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("cache unavailable: {0}")]
    CacheClosed(String),

    #[error("model {model} failed to fit: {reason}")]
    ModelFit { model: &'static str, reason: String },

    #[error("tuning error: {0}")]
    Tuning(String),

    #[error("insufficient data: need {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn fit(model: &'static str, reason: impl Into<String>) -> Self {
        Self::ModelFit {
            model,
            reason: reason.into(),
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
