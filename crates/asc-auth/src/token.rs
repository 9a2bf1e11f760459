//! ES256 bearer token minting
//!
//! App Store Connect authenticates each request with a JWT signed by the
//! team's API key. Tokens are minted fresh for every request and never
//! cached: the lifetime is fixed at 20 minutes and nothing outlives the call
//! that minted it.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::constants::{TOKEN_AUDIENCE, TOKEN_LIFETIME_SECS};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};

/// Claims carried by every App Store Connect token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

/// A signed token ready for the `Authorization` header.
///
/// `issued_at` and `expires_at` are unix timestamps in seconds.
#[derive(Debug, Clone)]
pub struct BearerToken {
    jwt: Secret<String>,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl BearerToken {
    /// The compact JWT.
    pub fn jwt(&self) -> &str {
        self.jwt.expose()
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.jwt.expose())
    }
}

/// Mints bearer tokens from an injected credential store.
#[derive(Clone)]
pub struct TokenMinter {
    store: Arc<dyn CredentialStore>,
}

impl TokenMinter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Mint a token issued now.
    pub async fn mint(&self) -> Result<BearerToken> {
        self.mint_at(unix_now()).await
    }

    /// Mint a token with an explicit issue time.
    pub async fn mint_at(&self, issued_at: u64) -> Result<BearerToken> {
        let credentials = self.store.get().await?.ok_or(Error::MissingCredentials)?;
        sign(&credentials, issued_at)
    }
}

/// Sign a token for `credentials` issued at `issued_at`.
///
/// The stored key is base64 of a PKCS#8 PEM. Any failure decoding,
/// importing or signing with it is a `SigningFailure`.
pub fn sign(credentials: &Credentials, issued_at: u64) -> Result<BearerToken> {
    let pem = Zeroizing::new(
        STANDARD
            .decode(credentials.private_key.expose().trim())
            .map_err(|e| Error::SigningFailure(format!("private key is not valid base64: {e}")))?,
    );
    let key = EncodingKey::from_ec_pem(&pem)
        .map_err(|e| Error::SigningFailure(format!("private key is not a P-256 PEM key: {e}")))?;

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(credentials.api_key_id.clone());
    header.typ = Some("JWT".into());

    let expires_at = issued_at + TOKEN_LIFETIME_SECS;
    let claims = Claims {
        iss: credentials.issuer_id.clone(),
        aud: TOKEN_AUDIENCE.into(),
        iat: issued_at,
        exp: expires_at,
    };

    let jwt = jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| Error::SigningFailure(e.to_string()))?;

    debug!(kid = %credentials.api_key_id, issued_at, expires_at, "minted bearer token");
    Ok(BearerToken {
        jwt: Secret::new(jwt),
        issued_at,
        expires_at,
    })
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
