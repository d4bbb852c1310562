use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Crypto,
    Stock,
    Etf,
    RealEstate,
}

impl AssetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Stock => "stock",
            Self::Etf => "etf",
            Self::RealEstate => "real_estate",
        }
    }

    pub fn is_crypto(self) -> bool {
        matches!(self, Self::Crypto)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(Self::Crypto),
            "stock" | "equity" => Ok(Self::Stock),
            "etf" => Ok(Self::Etf),
            "real_estate" | "realestate" | "real-estate" => Ok(Self::RealEstate),
            other => Err(AppError::Config(format!(
                "unknown asset class '{}', expected crypto/stock/etf/real_estate",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("Crypto".parse::<AssetClass>().unwrap(), AssetClass::Crypto);
        assert_eq!("equity".parse::<AssetClass>().unwrap(), AssetClass::Stock);
        assert_eq!(
            "real-estate".parse::<AssetClass>().unwrap(),
            AssetClass::RealEstate
        );
        assert!("bond".parse::<AssetClass>().is_err());
    }
}
