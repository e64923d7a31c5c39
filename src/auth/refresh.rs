//! Silent access-token renewal for non-interactive invocations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use super::credential::Credential;
use super::discovery::ProviderDiscovery;
use super::error::AuthError;
use super::identity::{IdentityClaims, IdentityTokenValidator};
use super::token::{OAuthErrorCode, TokenEndpoint, TokenGrant, TokenResponse};
use crate::config::{Context, ContextStore};

/// Refresh grants answer errors with any of these; the body decides the outcome.
const REFRESH_ACCEPTED_STATUSES: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
];

/// Returns a usable access token for a context, renewing it when expired.
///
/// A fresh stored token is returned without any network call. Otherwise a
/// single refresh-grant round trip is made and the result is persisted.
pub struct RefreshCoordinator {
    discovery: ProviderDiscovery,
    endpoint: TokenEndpoint,
    validator: Arc<IdentityTokenValidator>,
    store: Arc<dyn ContextStore>,
}

impl RefreshCoordinator {
    pub fn new(
        discovery: ProviderDiscovery,
        endpoint: TokenEndpoint,
        validator: Arc<IdentityTokenValidator>,
        store: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            discovery,
            endpoint,
            validator,
            store,
        }
    }

    pub async fn access_token(&self, context: &Context) -> Result<String, AuthError> {
        if let Some(token) = fresh_token(&context.credential, Utc::now()) {
            return Ok(token);
        }
        let refresh_token = match context.credential.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::NotLoggedIn),
        };

        tracing::debug!(context = %context.name, "access token expired, refreshing");
        let provider = self.discovery.discover(&context.url).await?;
        let issued_at = Utc::now();
        let response = self
            .endpoint
            .exchange(
                &provider,
                TokenGrant::RefreshToken(refresh_token),
                REFRESH_ACCEPTED_STATUSES,
            )
            .await?;

        match response.error_code() {
            None => {}
            Some(OAuthErrorCode::AuthorizationPending) => {
                tracing::warn!("refresh grant answered authorization_pending; keeping stored token");
                return context
                    .credential
                    .access_token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or(AuthError::NotLoggedIn);
            }
            Some(OAuthErrorCode::ExpiredToken) => return Err(AuthError::LoginTimedOut),
            Some(OAuthErrorCode::AccessDenied) => return Err(AuthError::AccessDenied),
            Some(OAuthErrorCode::InvalidGrant) => return Err(AuthError::CredentialExpired),
            Some(OAuthErrorCode::SlowDown | OAuthErrorCode::Other(_)) => {
                return Err(AuthError::Protocol(format!(
                    "unexpected refresh error '{}'",
                    response.error.as_deref().unwrap_or_default()
                )));
            }
        }
        response.ensure_access_token()?;

        let claims = self.validator.verified_claims(&response, &provider).await;
        self.persist(context, &response, claims.as_ref(), issued_at)
    }

    /// Save the refreshed credential, reconciling with a concurrent writer once.
    fn persist(
        &self,
        context: &Context,
        response: &TokenResponse,
        claims: Option<&IdentityClaims>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let mut updated = context.clone();
        updated
            .credential
            .apply_token_response(response, claims, issued_at)?;
        match self.store.save(&updated) {
            Ok(_) => {}
            Err(AuthError::ContextConflict(_)) => {
                let mut current = self
                    .store
                    .load(&context.name)?
                    .ok_or_else(|| AuthError::UnknownContext(context.name.clone()))?;
                if let Some(token) = fresh_token(&current.credential, Utc::now()) {
                    tracing::debug!(context = %context.name, "using token stored by a concurrent refresh");
                    return Ok(token);
                }
                current
                    .credential
                    .apply_token_response(response, claims, issued_at)?;
                self.store.save(&current)?;
            }
            Err(err) => return Err(err),
        }
        tracing::info!(context = %context.name, "access token refreshed");
        Ok(response.access_token.clone())
    }
}

fn fresh_token(credential: &Credential, now: DateTime<Utc>) -> Option<String> {
    if credential.is_fresh(now) {
        credential.access_token.clone()
    } else {
        None
    }
}
