//! Identity-token verification against the provider's published key set.

use std::collections::HashMap;
use std::sync::Mutex;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;

use super::discovery::AuthProvider;
use super::error::IdentityTokenError;
use super::token::TokenResponse;

/// Profile claims carried by a verified identity token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default, rename = "ivcap/claims/account-id")]
    pub account_id: Option<String>,
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

/// Standard registered claims (RFC 7519 §4.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegisteredClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

/// Verifies identity tokens and extracts [`IdentityClaims`].
///
/// Key sets are cached per JWKS URL for the lifetime of the validator and
/// refetched once when a token names a key the cached set lacks.
///
/// # Example
/// ```no_run
/// use authctx::auth::IdentityTokenValidator;
///
/// # async fn run(id_token: &str) -> Result<(), authctx::auth::IdentityTokenError> {
/// let validator = IdentityTokenValidator::new(reqwest::Client::new());
/// let claims = validator
///     .validate(id_token, "https://login.example/.well-known/jwks.json", "client-id")
///     .await?;
/// println!("{:?}", claims.email);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IdentityTokenValidator {
    client: reqwest::Client,
    key_sets: Mutex<HashMap<String, JwkSet>>,
}

impl IdentityTokenValidator {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            key_sets: Mutex::new(HashMap::new()),
        }
    }

    /// Verify signature, `exp`, `nbf` and `aud` (= `client_id`), then decode the claims.
    pub async fn validate(
        &self,
        id_token: &str,
        jwks_url: &str,
        client_id: &str,
    ) -> Result<IdentityClaims, IdentityTokenError> {
        if id_token.trim().is_empty() {
            return Err(IdentityTokenError::Malformed("no ID token received".to_string()));
        }
        let header = decode_header(id_token)?;
        let kid = header.kid.as_deref();

        let key = match self.cached_key(jwks_url, kid) {
            Some(jwk) => jwk,
            None => {
                let jwks = self.fetch_key_set(jwks_url).await?;
                let jwk = select_key(&jwks, kid).cloned();
                self.store_key_set(jwks_url, jwks);
                jwk.ok_or_else(|| {
                    IdentityTokenError::Verification(format!(
                        "no matching key for kid {:?} in key set",
                        kid.unwrap_or("<none>")
                    ))
                })?
            }
        };
        let decoding_key = DecodingKey::from_jwk(&key)
            .map_err(|e| IdentityTokenError::KeySet(format!("unusable key - {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[client_id]);

        let data = decode::<IdentityClaims>(id_token, &decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Best-effort claim extraction after a successful token response.
    ///
    /// Returns `None` (and logs why) when the response carries no identity
    /// token or the token fails verification; the caller keeps its prior
    /// identity fields in that case.
    pub async fn verified_claims(
        &self,
        response: &TokenResponse,
        provider: &AuthProvider,
    ) -> Option<IdentityClaims> {
        let id_token = response.id_token.as_deref().filter(|t| !t.is_empty())?;
        match self
            .validate(id_token, &provider.jwks_url, &provider.client_id)
            .await
        {
            Ok(claims) => Some(claims),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unverifiable identity token");
                None
            }
        }
    }

    fn cached_key(&self, jwks_url: &str, kid: Option<&str>) -> Option<Jwk> {
        let guard = self.key_sets.lock().ok()?;
        select_key(guard.get(jwks_url)?, kid).cloned()
    }

    fn store_key_set(&self, jwks_url: &str, jwks: JwkSet) {
        if let Ok(mut guard) = self.key_sets.lock() {
            guard.insert(jwks_url.to_string(), jwks);
        }
    }

    async fn fetch_key_set(&self, jwks_url: &str) -> Result<JwkSet, IdentityTokenError> {
        tracing::debug!(url = %jwks_url, "fetching key set");
        let resp = self
            .client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| IdentityTokenError::KeySet(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(IdentityTokenError::KeySet(format!(
                "HTTP {} from JWKS endpoint",
                resp.status()
            )));
        }
        resp.json::<JwkSet>()
            .await
            .map_err(|e| IdentityTokenError::KeySet(e.to_string()))
    }
}

/// Key named by `kid`, or the only key of a single-key set when the token names none.
fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .find(|key| key.common.key_id.as_deref() == Some(kid)),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
}
