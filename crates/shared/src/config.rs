//! Application configuration management.

use serde::Deserialize;

use crate::error::AppError;
use crate::types::Currency;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Settlement engine configuration.
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Settlement engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// The single currency code settlements are denominated in.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Seed list for the invoice authorization-code catalog.
    #[serde(default)]
    pub authorization_codes: Vec<String>,
    /// Minimum number of characters for a partner directory search.
    #[serde(default = "default_min_partner_search_len")]
    pub min_partner_search_len: usize,
}

fn default_currency() -> String {
    "GTQ".to_string()
}

fn default_min_partner_search_len() -> usize {
    2
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            authorization_codes: Vec::new(),
            min_partner_search_len: default_min_partner_search_len(),
        }
    }
}

impl SettlementConfig {
    /// Resolves the configured currency code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` if the code is not a supported currency.
    pub fn currency(&self) -> Result<Currency, AppError> {
        self.currency.parse().map_err(AppError::Configuration)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "liquida=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("LIQUIDA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("settlement.authorization_codes")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
