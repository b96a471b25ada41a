//! Integration coverage for the Signer's public API (spec §4.1, §8), exercised only through
//! `kalshi_stream::Signer`/`AuthContext`.

use kalshi_stream::{AuthContext, Signer};
use rsa::RsaPrivateKey;

fn test_signer() -> Signer {
    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("generate test key");
    Signer::new("integration-test-key", private_key)
}

/// `Signer::sign` is called from async contexts everywhere in this crate (REST bootstrap, the WS
/// handshake); drive it through `tokio_test::block_on` the same way those call sites run inside
/// an async fn, rather than calling it from a plain sync test.
#[test]
fn sign_ws_handshake_is_callable_from_an_async_context() {
    async fn sign_async(signer: &Signer) -> kalshi_stream::Result<String> {
        let headers = signer.sign_ws_handshake()?;
        Ok(headers.signature)
    }

    let signer = test_signer();
    let signature = tokio_test::block_on(sign_async(&signer)).expect("signing should succeed");
    assert!(!signature.is_empty());
}

/// Loads real credentials from a local `.env` (see `.env.example`) and signs a live login
/// request. Skipped by default since it requires a provisioned Kalshi account; run explicitly
/// with `cargo test -- --ignored` once `.env` is populated.
#[test]
#[ignore]
fn from_env_loads_real_credentials_and_signs_login() {
    dotenvy::dotenv().ok();

    let auth = AuthContext::from_env().expect("KALSHI_* env vars must be set in .env");
    let headers = auth.signer.sign_login().expect("signing with real key should succeed");
    assert!(!headers.signature.is_empty());
}
