//! Configuration loading (spec §3, §4.8): the exchange/connection settings in
//! `config/common/config.yaml`, the subscribed markets in `config/pipeline/tickers.yaml`, and
//! the authentication material sourced from the environment.
//!
//! Grounded in `original_source/packages/common/src/common/state.py` (`State`) for the
//! env-var/YAML split and the refresh cadence, adapted to the teacher's file-based
//! `AvellanedaConfig::from_file` + `anyhow::ensure!` validation idiom
//! (`examples/feothyuth-lr/src/avellaneda/config.rs`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, StreamError};
use crate::signer::Signer;
use crate::types::MarketTicker;

/// Refresh period for config + tickers reload, matching the original's `REFRESH_PERIOD`.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    exchange: String,
    rest_base_url: String,
    ws_uri: String,
    reconnection_interval: u64,
    confirmation_timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTickers {
    market_tickers: Vec<String>,
}

/// Exchange connection settings, loaded from `config.yaml` and reloadable at runtime.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: String,
    pub rest_base_url: String,
    pub ws_uri: String,
    pub reconnection_interval: Duration,
    pub confirmation_timeout: Duration,
    pub tickers: Vec<MarketTicker>,
}

impl Config {
    /// Loads `config.yaml` and `tickers.yaml` from disk and validates the result.
    pub fn load(config_path: impl AsRef<Path>, tickers_path: impl AsRef<Path>) -> Result<Self> {
        let raw_config = load_yaml::<RawConfig>(config_path.as_ref())?;
        let raw_tickers = load_yaml::<RawTickers>(tickers_path.as_ref())?;
        Self::from_raw(raw_config, raw_tickers)
    }

    fn from_raw(raw_config: RawConfig, raw_tickers: RawTickers) -> Result<Self> {
        if raw_config.reconnection_interval == 0 {
            return Err(StreamError::ConfigMissing(
                "reconnection_interval must be greater than zero".to_string(),
            ));
        }
        if raw_config.confirmation_timeout == 0 {
            return Err(StreamError::ConfigMissing(
                "confirmation_timeout must be greater than zero".to_string(),
            ));
        }

        let tickers = raw_tickers
            .market_tickers
            .into_iter()
            .map(MarketTicker::from)
            .collect();

        Ok(Self {
            exchange: raw_config.exchange,
            rest_base_url: raw_config.rest_base_url,
            ws_uri: raw_config.ws_uri,
            reconnection_interval: Duration::from_secs(raw_config.reconnection_interval),
            confirmation_timeout: Duration::from_secs(raw_config.confirmation_timeout),
            tickers,
        })
    }
}

fn load_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|err| {
        StreamError::ConfigMissing(format!("unable to read {}: {err}", path.display()))
    })?;
    let value = serde_yaml::from_str(&data)?;
    Ok(value)
}

/// Paths to the two YAML config files, relative to a base directory.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub tickers_path: PathBuf,
}

impl ConfigPaths {
    pub fn under(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            config_path: base_dir.join("config/common/config.yaml"),
            tickers_path: base_dir.join("config/pipeline/tickers.yaml"),
        }
    }
}

/// Credentials and the loaded signer, sourced entirely from the environment.
///
/// `KALSHI_EMAIL` / `KALSHI_PASSWORD` authenticate the REST login; `KALSHI_ACCESS_KEY` /
/// `KALSHI_PRIVATE_KEY_PATH` produce the `Signer` used for every signed request thereafter.
#[derive(Clone)]
pub struct AuthContext {
    pub email: String,
    pub password: String,
    pub signer: Signer,
}

impl AuthContext {
    pub fn from_env() -> Result<Self> {
        let email = require_env("KALSHI_EMAIL")?;
        let password = require_env("KALSHI_PASSWORD")?;
        let access_key = require_env("KALSHI_ACCESS_KEY")?;
        let private_key_path = require_env("KALSHI_PRIVATE_KEY_PATH")?;

        let signer = Signer::from_pem_file(access_key, private_key_path)?;

        Ok(Self {
            email,
            password,
            signer,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    env::var(key)
        .map_err(|_| StreamError::ConfigMissing(format!("environment variable {key} is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RawConfig {
        RawConfig {
            exchange: "kalshi".to_string(),
            rest_base_url: "https://api.elections.kalshi.com".to_string(),
            ws_uri: "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string(),
            reconnection_interval: 5,
            confirmation_timeout: 10,
        }
    }

    fn sample_tickers() -> RawTickers {
        RawTickers {
            market_tickers: vec!["INXD-24DEC31-T5000".to_string()],
        }
    }

    #[test]
    fn from_raw_builds_config_with_durations() {
        let config = Config::from_raw(sample_config(), sample_tickers()).unwrap();
        assert_eq!(config.reconnection_interval, Duration::from_secs(5));
        assert_eq!(config.confirmation_timeout, Duration::from_secs(10));
        assert_eq!(config.tickers, vec![MarketTicker::from("INXD-24DEC31-T5000")]);
    }

    #[test]
    fn zero_reconnection_interval_is_rejected() {
        let mut raw = sample_config();
        raw.reconnection_interval = 0;
        let err = Config::from_raw(raw, sample_tickers());
        assert!(err.is_err());
    }
}
