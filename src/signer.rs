//! Request signing (spec §4.1).
//!
//! Produces the three headers the exchange requires on every authenticated request:
//! `KALSHI-ACCESS-KEY`, `KALSHI-ACCESS-SIGNATURE`, `KALSHI-ACCESS-TIMESTAMP`. The signature is
//! RSA-PSS(SHA-256, MGF1(SHA-256), salt length = digest length) over
//! `timestamp_ms || method || path`.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use pkcs8::DecodePrivateKey;
use rsa::pss::SigningKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use signature::RandomizedSigner;

use crate::errors::{Result, StreamError};

/// WebSocket handshake path, signed with method `GET` (undocumented but required).
pub const WS_AUTH_PATH: &str = "/trade-api/ws/v2";
pub const LOGIN_PATH: &str = "/trade-api/v2/login";

/// A signed header triple ready to attach to an outbound request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub access_key: String,
    pub signature: String,
    pub timestamp_ms: u64,
}

/// RSA-PSS request signer. A plain value type — no interior mutability, no cached state —
/// so it can be shared freely between the REST bootstrap and the WebSocket handshake.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    private_key: RsaPrivateKey,
}

impl Signer {
    pub fn new(access_key: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            access_key: access_key.into(),
            private_key,
        }
    }

    /// Loads a PEM-encoded, password-less RSA private key from `path`.
    pub fn from_pem_file(access_key: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|err| {
            StreamError::ConfigMissing(format!(
                "unable to read private key at {}: {err}",
                path.display()
            ))
        })?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| rsa::pkcs1::DecodeRsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|err| StreamError::SigningFailed(format!("invalid private key PEM: {err}")))?;
        Ok(Self::new(access_key, private_key))
    }

    /// Signs `method`+`path` for the current time, returning the three auth headers.
    pub fn sign(&self, method: &str, path: &str) -> Result<SignedHeaders> {
        let timestamp_ms = current_timestamp_ms();
        self.sign_at(method, path, timestamp_ms)
    }

    /// Signs `method`+`path` at an explicit timestamp. Exposed for deterministic testing.
    pub fn sign_at(&self, method: &str, path: &str, timestamp_ms: u64) -> Result<SignedHeaders> {
        if !path.starts_with('/') {
            return Err(StreamError::SigningFailed(format!(
                "path must start with '/': {path}"
            )));
        }

        let message = format!("{timestamp_ms}{method}{path}");
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign_with_rng(&mut rand::rngs::OsRng, message.as_bytes())
            .map_err(|err| StreamError::SigningFailed(err.to_string()))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());

        Ok(SignedHeaders {
            access_key: self.access_key.clone(),
            signature: encoded,
            timestamp_ms,
        })
    }

    /// Convenience for the undocumented WebSocket handshake: `GET /trade-api/ws/v2`.
    pub fn sign_ws_handshake(&self) -> Result<SignedHeaders> {
        self.sign("GET", WS_AUTH_PATH)
    }

    /// Convenience for the REST login handshake: `POST /trade-api/v2/login`.
    pub fn sign_login(&self) -> Result<SignedHeaders> {
        self.sign("POST", LOGIN_PATH)
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
