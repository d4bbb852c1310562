//! TTL key/value store for predictions, fitted models and tuned
//! hyperparameters.

use std::time::Duration;

use crate::error::AppResult;
use crate::predictor::ModelKind;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Shared store. Concurrent writers to one key resolve last-write-wins;
/// staleness is detected through the data fingerprint embedded in keys.
pub trait ModelCache: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()>;
    fn delete(&self, key: &str) -> AppResult<()>;
}

pub fn prediction_key(symbol: &str, days: usize, fingerprint: u64) -> String {
    format!(
        "prediction:{}:{}:{:016x}",
        symbol.to_ascii_uppercase(),
        days,
        fingerprint
    )
}

pub fn model_key(symbol: &str, model: ModelKind, fingerprint: u64) -> String {
    format!(
        "model:{}:{}:{:016x}",
        symbol.to_ascii_uppercase(),
        model.name(),
        fingerprint
    )
}

pub fn hyperparams_key(symbol: &str, model: ModelKind) -> String {
    format!("hyperparams:{}:{}", symbol.to_ascii_uppercase(), model.name())
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the series length and the bit pattern of every price.
pub fn fingerprint(prices: &[f64]) -> u64 {
    let mut h = FNV_OFFSET;
    let mut feed = |bytes: [u8; 8]| {
        for b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
    };
    feed((prices.len() as u64).to_le_bytes());
    for p in prices {
        feed(p.to_bits().to_le_bytes());
    }
    h
}

/// FNV-1a over raw bytes; used for deterministic per-symbol seeds.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, b| {
        (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}
