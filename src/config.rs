//! Configuration management for the order bot

use anyhow::Result;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database
    pub database_path: String,

    /// Base URL of the Saros DLMM quote/swap API
    pub dlmm_api_url: String,

    /// Seconds between monitor sweeps
    pub tick_interval_seconds: u64,

    /// Deadline for a single quote request, in seconds
    pub quote_timeout_seconds: u64,

    /// Deadline for the build/submit/confirm sequence, in seconds
    pub execution_timeout_seconds: u64,

    /// Slippage tolerance applied to the minimum-received bound (0.005 = 0.5%)
    pub slippage_tolerance: Decimal,

    /// Failed execution attempts before an order goes terminal Failed
    /// (0 = retry forever)
    pub max_execution_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "orders.db".to_string(),
            dlmm_api_url: "https://api.saros.finance/dlmm".to_string(),
            tick_interval_seconds: 30,
            quote_timeout_seconds: 10,
            execution_timeout_seconds: 20,
            slippage_tolerance: Decimal::new(5, 3), // 0.5%
            max_execution_attempts: 5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let database_path =
            env::var("DATABASE_PATH").unwrap_or(defaults.database_path);

        let dlmm_api_url = env::var("DLMM_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.dlmm_api_url);

        let tick_interval_seconds = env::var("TICK_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.tick_interval_seconds);

        let quote_timeout_seconds = env::var("QUOTE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.quote_timeout_seconds);

        let execution_timeout_seconds = env::var("EXECUTION_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.execution_timeout_seconds);

        let slippage_tolerance = env::var("SLIPPAGE_TOLERANCE")
            .ok()
            .and_then(|v| Decimal::from_str(&v).ok())
            .unwrap_or(defaults.slippage_tolerance);

        let max_execution_attempts = env::var("MAX_EXECUTION_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_execution_attempts);

        let config = Self {
            database_path,
            dlmm_api_url,
            tick_interval_seconds,
            quote_timeout_seconds,
            execution_timeout_seconds,
            slippage_tolerance,
            max_execution_attempts,
        };
        config.validate()?;

        Ok(config)
    }

    /// Sanity-check the loaded values
    fn validate(&self) -> Result<()> {
        if self.tick_interval_seconds == 0 {
            anyhow::bail!("TICK_INTERVAL_SECONDS must be positive");
        }
        if self.quote_timeout_seconds >= self.tick_interval_seconds {
            anyhow::bail!("QUOTE_TIMEOUT_SECONDS must be below the tick interval");
        }
        if self.execution_timeout_seconds >= self.tick_interval_seconds {
            anyhow::bail!("EXECUTION_TIMEOUT_SECONDS must be below the tick interval");
        }
        if self.slippage_tolerance < Decimal::ZERO || self.slippage_tolerance >= Decimal::ONE {
            anyhow::bail!("SLIPPAGE_TOLERANCE must be in [0, 1)");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_seconds)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }
}
