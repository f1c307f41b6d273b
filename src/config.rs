//! Configuration management for the market engine
//! Supports environment variables and default values for market parameters

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::user::DEFAULT_STARTING_BALANCE;

/// Configuration for the market engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market configuration
    pub market: MarketConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
}

/// Market-specific configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Balance granted to newly created users (default: 1000.00)
    pub starting_balance: Decimal,

    /// Liquidity parameter for markets created without an explicit one
    /// (default: 100.0)
    pub default_liquidity: f64,
}

/// Persistence layer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the JSON snapshots (default: data/)
    pub data_dir: PathBuf,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            default_liquidity: 100.0,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(balance) = env::var("MARKET_STARTING_BALANCE") {
            config.market.starting_balance = balance
                .parse()
                .unwrap_or(config.market.starting_balance);
        }

        if let Ok(liquidity) = env::var("MARKET_DEFAULT_LIQUIDITY") {
            config.market.default_liquidity = liquidity
                .parse()
                .unwrap_or(config.market.default_liquidity);
        }

        if let Ok(data_dir) = env::var("MARKET_DATA_DIR") {
            config.persistence.data_dir = PathBuf::from(data_dir);
        }

        config.validate();

        config
    }

    /// Validate configuration values, resetting anything out of range
    fn validate(&mut self) {
        if self.market.starting_balance < Decimal::ZERO {
            warn!(
                starting_balance = %self.market.starting_balance,
                "invalid starting balance, using default"
            );
            self.market.starting_balance = DEFAULT_STARTING_BALANCE;
        }

        if !(self.market.default_liquidity > 0.0) || !self.market.default_liquidity.is_finite() {
            warn!(
                default_liquidity = self.market.default_liquidity,
                "invalid default liquidity, using default"
            );
            self.market.default_liquidity = 100.0;
        }
    }

    /// Print current configuration for debugging
    pub fn print_config(&self) {
        println!("🔧 Market Engine Configuration:");
        println!("   Starting Balance: {}", self.market.starting_balance);
        println!("   Default Liquidity: {}", self.market.default_liquidity);
        println!("   Data Dir: {}", self.persistence.data_dir.display());
    }
}
