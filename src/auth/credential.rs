use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::identity::IdentityClaims;
use super::token::TokenResponse;

/// Seconds shaved off the server-declared lifetime to absorb clock skew and
/// transport latency.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 10;

/// Credential fields persisted inside a context record.
///
/// # Example
/// ```no_run
/// use authctx::auth::Credential;
/// use chrono::Utc;
///
/// let mut credential = Credential::default();
/// credential.apply_access_token("access".to_string(), 3600, Utc::now())?;
/// assert!(credential.is_fresh(Utc::now()));
/// # Ok::<(), authctx::auth::AuthError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    /// True when an access token is stored and `now` is before its expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.access_token_expiry) {
            (Some(token), Some(expiry)) => !token.is_empty() && now < expiry,
            _ => false,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Store a new access token issued at `issued_at` with a lifetime of
    /// `expires_in` seconds. Nothing changes if the lifetime is out of range.
    pub fn apply_access_token(
        &mut self,
        access_token: String,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let expiry = expiry_from(issued_at, expires_in)?;
        self.access_token = Some(access_token);
        self.access_token_expiry = Some(expiry);
        Ok(())
    }

    /// Copy verified profile claims into the identity fields.
    pub fn apply_claims(&mut self, claims: &IdentityClaims) {
        self.account_name = claims.name.clone();
        self.account_nickname = claims.nickname.clone();
        self.email = claims.email.clone();
        self.account_id = claims.account_id.clone();
    }

    /// Fold a successful token response into the credential.
    ///
    /// A response without a refresh token keeps the stored one. Identity
    /// fields change only when verified `claims` are supplied.
    pub fn apply_token_response(
        &mut self,
        response: &TokenResponse,
        claims: Option<&IdentityClaims>,
        issued_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.apply_access_token(response.access_token.clone(), response.expires_in, issued_at)?;
        if let Some(refresh) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.refresh_token = Some(refresh.to_string());
        }
        if let Some(claims) = claims {
            self.apply_claims(claims);
        }
        Ok(())
    }

    /// Drop the access and refresh tokens. Identity fields are kept for display.
    pub fn clear_tokens(&mut self) {
        self.access_token = None;
        self.access_token_expiry = None;
        self.refresh_token = None;
    }
}

/// Absolute expiry for a token issued at `issued_at`.
pub fn expiry_from(issued_at: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AuthError> {
    expires_in
        .checked_sub(EXPIRY_SAFETY_MARGIN_SECS)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::Protocol(format!("token lifetime {expires_in}s out of range")))
}
