//! Central configuration for the ticker engine.
//!
//! Loads from `config.toml` at the project root.
//! All engine parameters are runtime-configurable — no recompilation needed.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::core::{Error, Result};

/// One seeded instrument.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedStock {
    pub symbol: String,
    pub price: Decimal,
}

/// Engine parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// Milliseconds between update cycles
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Per-stock chance of being mutated on a tick (draw > this means skip)
    #[serde(default = "default_update_probability")]
    pub update_probability: f64,
    /// Max price move per mutation as a fraction of current price (0.002 = ±0.2%)
    #[serde(default = "default_range_percent")]
    pub range_percent: f64,
    /// Sign draw threshold; draw above this means the move is positive
    #[serde(default = "default_sign_bias")]
    pub sign_bias: f64,
    /// Instruments seeded into the store at startup
    #[serde(default = "default_stocks")]
    pub stocks: Vec<SeedStock>,
}

fn default_tick_interval_ms() -> u64 {
    250
}
fn default_update_probability() -> f64 {
    0.10
}
fn default_range_percent() -> f64 {
    0.002
}
fn default_sign_bias() -> f64 {
    0.51
}
fn default_stocks() -> Vec<SeedStock> {
    vec![
        SeedStock {
            symbol: "MSFT".to_string(),
            price: Decimal::new(3031, 2),
        },
        SeedStock {
            symbol: "APPL".to_string(),
            price: Decimal::new(57818, 2),
        },
        SeedStock {
            symbol: "GOOG".to_string(),
            price: Decimal::new(57030, 2),
        },
    ]
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            update_probability: default_update_probability(),
            range_percent: default_range_percent(),
            sign_bias: default_sign_bias(),
            stocks: default_stocks(),
        }
    }
}

impl TickerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject invalid parameters up front, never at tick time.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.update_probability) {
            return Err(Error::Config(format!(
                "update_probability must be in [0, 1], got {}",
                self.update_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.sign_bias) {
            return Err(Error::Config(format!(
                "sign_bias must be in [0, 1], got {}",
                self.sign_bias
            )));
        }
        if !self.range_percent.is_finite() || self.range_percent < 0.0 {
            return Err(Error::Config(format!(
                "range_percent must be non-negative, got {}",
                self.range_percent
            )));
        }

        let mut seen = HashSet::new();
        for seed in &self.stocks {
            if seed.price < Decimal::ZERO {
                return Err(Error::Config(format!(
                    "seed price for {} must be non-negative",
                    seed.symbol
                )));
            }
            if !seen.insert(seed.symbol.to_uppercase()) {
                return Err(Error::Config(format!(
                    "duplicate seed symbol: {}",
                    seed.symbol
                )));
            }
        }
        Ok(())
    }
}

/// Top-level config file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Address the WebSocket listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub ticker: TickerConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            ticker: TickerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from the default location (project root config.toml).
    pub fn load_default() -> Self {
        let candidates = [
            "config.toml",
            concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml"),
        ];

        for path in &candidates {
            if let Ok(cfg) = Self::load(Path::new(path)) {
                tracing::info!("📋 Loaded config from {}", path);
                return cfg;
            }
        }

        tracing::warn!("⚠️ No config.toml found, using defaults");
        Self::default()
    }
}
