//! REST client (spec §6): only the endpoints used by the streaming bootstrap — login,
//! exchange schedule/status, and the portfolio-balance connectivity probe.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/rest.py` (`KalshiRestClient`) for
//! the endpoint set and signed-header attachment, adapted to the teacher's thin-wrapper-over-a-
//! client-handle shape (`examples/feothyuth-lr/src/lighter_client/rest.rs`'s `RestClient`) using
//! `reqwest` directly in place of the teacher's openapi-generated bindings, which this crate
//! doesn't carry.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StreamError};
use crate::signer::{Signer, LOGIN_PATH};

const EXCHANGE_SCHEDULE_PATH: &str = "/trade-api/v2/exchange/schedule";
const EXCHANGE_STATUS_PATH: &str = "/trade-api/v2/exchange/status";
const PORTFOLIO_BALANCE_PATH: &str = "/trade-api/v2/portfolio/balance";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub member_id: String,
}

/// `{exchange_active, trading_active}`, polled every 60s per spec §4.8.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExchangeStatus {
    pub exchange_active: bool,
    pub trading_active: bool,
}

impl ExchangeStatus {
    /// Derived projection per spec §6: `(T,T)`/`(T,F)`/`(F,F)`/`(F,T)`.
    pub fn status(&self) -> ExchangeStatusLabel {
        match (self.exchange_active, self.trading_active) {
            (true, true) => ExchangeStatusLabel::ActiveTradingEnabled,
            (true, false) => ExchangeStatusLabel::ActiveTradingDisabled,
            (false, false) => ExchangeStatusLabel::InactiveTradingDisabled,
            (false, true) => ExchangeStatusLabel::InvalidState,
        }
    }

    pub fn is_trading_active(&self) -> bool {
        matches!(self.status(), ExchangeStatusLabel::ActiveTradingEnabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatusLabel {
    ActiveTradingEnabled,
    ActiveTradingDisabled,
    InactiveTradingDisabled,
    InvalidState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSchedule {
    #[serde(flatten)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioBalance {
    pub balance: i64,
    #[serde(default)]
    pub available_payout: Option<i64>,
}

/// Thin wrapper over `reqwest::Client` that attaches signed headers per request.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    signer: Signer,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, signer: Signer) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            signer,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_signed<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let headers = self.signer.sign("GET", path)?;
        let response = self
            .http
            .get(self.url(path))
            .header("KALSHI-ACCESS-KEY", headers.access_key)
            .header("KALSHI-ACCESS-SIGNATURE", headers.signature)
            .header("KALSHI-ACCESS-TIMESTAMP", headers.timestamp_ms.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::AuthRejected(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        Ok(response.json::<T>().await?)
    }

    /// `POST /trade-api/v2/login`. Fatal to the bootstrap on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let headers = self.signer.sign_login()?;
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .header("KALSHI-ACCESS-KEY", headers.access_key)
            .header("KALSHI-ACCESS-SIGNATURE", headers.signature)
            .header("KALSHI-ACCESS-TIMESTAMP", headers.timestamp_ms.to_string())
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::AuthRejected(format!(
                "login returned {}",
                response.status()
            )));
        }

        Ok(response.json::<LoginResponse>().await?)
    }

    pub async fn exchange_schedule(&self) -> Result<ExchangeSchedule> {
        self.get_signed(EXCHANGE_SCHEDULE_PATH).await
    }

    pub async fn exchange_status(&self) -> Result<ExchangeStatus> {
        self.get_signed(EXCHANGE_STATUS_PATH).await
    }

    pub async fn portfolio_balance(&self) -> Result<PortfolioBalance> {
        self.get_signed(PORTFOLIO_BALANCE_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_status_projection_matches_truth_table() {
        assert_eq!(
            ExchangeStatus { exchange_active: true, trading_active: true }.status(),
            ExchangeStatusLabel::ActiveTradingEnabled
        );
        assert_eq!(
            ExchangeStatus { exchange_active: true, trading_active: false }.status(),
            ExchangeStatusLabel::ActiveTradingDisabled
        );
        assert_eq!(
            ExchangeStatus { exchange_active: false, trading_active: false }.status(),
            ExchangeStatusLabel::InactiveTradingDisabled
        );
        assert_eq!(
            ExchangeStatus { exchange_active: false, trading_active: true }.status(),
            ExchangeStatusLabel::InvalidState
        );
    }

    #[test]
    fn is_trading_active_only_true_for_active_trading_enabled() {
        assert!(ExchangeStatus { exchange_active: true, trading_active: true }.is_trading_active());
        assert!(!ExchangeStatus { exchange_active: true, trading_active: false }.is_trading_active());
    }
}
