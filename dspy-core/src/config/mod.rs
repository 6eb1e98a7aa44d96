//! Configuration surface: a JSON file loaded from a CLI-provided path.
//!
//! Mirrors `config.py`'s dataclasses field-for-field, including defaults.
//! Validation happens once, at load time — per the error-handling design,
//! configuration problems are fatal and never retried.

use crate::core::ConfigError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

fn default_vault_address() -> Option<String> {
    None
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub account_address: Option<String>,
    #[serde(default = "default_vault_address")]
    pub vault_address: Option<String>,
}

fn default_coins() -> Vec<String> {
    vec!["BTC".to_string()]
}

fn default_leverage() -> u32 {
    20
}

fn default_is_cross() -> bool {
    true
}

fn default_max_position_usd() -> Decimal {
    Decimal::new(1000, 0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_coins")]
    pub coins: Vec<String>,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default = "default_is_cross")]
    pub is_cross: bool,
    #[serde(default = "default_max_position_usd")]
    pub max_position_usd: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            coins: default_coins(),
            leverage: default_leverage(),
            is_cross: default_is_cross(),
            max_position_usd: default_max_position_usd(),
        }
    }
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_format() -> String {
    "jsonl".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub record_l2: bool,
    #[serde(default = "default_true")]
    pub record_l4: bool,
    #[serde(default = "default_true")]
    pub record_trades: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: default_output_dir(),
            format: default_format(),
            record_l2: true,
            record_l4: true,
            record_trades: true,
        }
    }
}

fn default_base_url() -> String {
    "https://api.hyperliquid.xyz".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_tick_interval_s() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub paper_mode: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_tick_interval_s")]
    pub tick_interval_s: f64,
    #[serde(default)]
    pub l4_server_url: Option<String>,
    #[serde(default)]
    pub recording: RecordingConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            account_address: None,
            vault_address: None,
        }
    }
}

impl Config {
    /// Parse and validate `path`. Missing required fields, an empty coin
    /// list, or a malformed `base_url` are all load-time fatal per the
    /// error-handling design.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config = serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.coins.is_empty() {
            return Err(ConfigError::EmptyCoinList);
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }
        if !self.paper_mode {
            let has_wallet = self.wallet.secret_key.is_some() && self.wallet.account_address.is_some();
            if !has_wallet {
                return Err(ConfigError::WalletRequiredForLiveMode);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn paper_mode_does_not_require_wallet_credentials() {
        let file = write_config(r#"{"paper_mode": true, "trading": {"coins": ["BTC"]}}"#);
        let config = Config::load(file.path()).unwrap();
        assert!(config.paper_mode);
        assert_eq!(config.trading.leverage, 20);
    }

    #[test]
    fn live_mode_without_wallet_is_rejected() {
        let file = write_config(r#"{"paper_mode": false, "trading": {"coins": ["BTC"]}}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err, ConfigError::WalletRequiredForLiveMode);
    }

    #[test]
    fn empty_coin_list_is_rejected() {
        let file = write_config(r#"{"paper_mode": true, "trading": {"coins": []}}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyCoinList);
    }

    #[test]
    fn defaults_match_the_original_config_dataclass() {
        let file = write_config(r#"{"paper_mode": true}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.base_url, "https://api.hyperliquid.xyz");
        assert_eq!(config.tick_interval_s, 1.0);
        assert!(!config.recording.enabled);
        assert_eq!(config.trading.coins, vec!["BTC".to_string()]);
    }
}
