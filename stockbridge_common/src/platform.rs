use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The marketplaces whose orders and stock levels are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Shopee,
    Lazada,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Shopee, Platform::Lazada, Platform::Tiktok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopee => "SHOPEE",
            Platform::Lazada => "LAZADA",
            Platform::Tiktok => "TIKTOK",
        }
    }

    /// The name of the per-platform "stock adjusted" flag column on the movement tables.
    pub fn flag_column(&self) -> &'static str {
        match self {
            Platform::Shopee => "shopee",
            Platform::Lazada => "lazada",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Human-facing name, as used in job route names (`getPendingShopeeOrders`).
    pub fn title(&self) -> &'static str {
        match self {
            Platform::Shopee => "Shopee",
            Platform::Lazada => "Lazada",
            Platform::Tiktok => "Tiktok",
        }
    }

    pub fn others(&self) -> Vec<Platform> {
        Self::ALL.into_iter().filter(|p| p != self).collect()
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown platform: {0}")]
pub struct PlatformParseError(pub String);

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopee" => Ok(Platform::Shopee),
            "lazada" => Ok(Platform::Lazada),
            "tiktok" | "tiktokshop" | "tiktok_shop" => Ok(Platform::Tiktok),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("shopee".parse::<Platform>().unwrap(), Platform::Shopee);
        assert_eq!("LAZADA".parse::<Platform>().unwrap(), Platform::Lazada);
        assert_eq!("TikTok".parse::<Platform>().unwrap(), Platform::Tiktok);
        assert!("amazon".parse::<Platform>().is_err());
    }

    #[test]
    fn other_platforms() {
        assert_eq!(Platform::Shopee.others(), vec![Platform::Lazada, Platform::Tiktok]);
        assert_eq!(Platform::Tiktok.others(), vec![Platform::Shopee, Platform::Lazada]);
    }
}
