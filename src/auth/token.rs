use reqwest::StatusCode;
use serde::Deserialize;
use strum::EnumString;

use super::discovery::AuthProvider;
use super::error::AuthError;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
pub const REFRESH_TOKEN_GRANT_TYPE: &str = "refresh_token";

/// Token endpoint response, success or error.
///
/// An empty `error` means success; the access token is then required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// OAuth error codes the token endpoint may answer with.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OAuthErrorCode {
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    AccessDenied,
    InvalidGrant,
    #[strum(default)]
    Other(String),
}

impl TokenResponse {
    /// `None` when the response carries no error code.
    pub fn error_code(&self) -> Option<OAuthErrorCode> {
        let code = self.error.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        Some(
            code.parse()
                .unwrap_or_else(|_| OAuthErrorCode::Other(code.to_string())),
        )
    }

    /// Check a success response actually carries an access token.
    pub fn ensure_access_token(&self) -> Result<(), AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::Protocol(
                "token response has neither an access token nor an error".to_string(),
            ));
        }
        Ok(())
    }
}

/// Grant presented to the token endpoint.
#[derive(Debug, Clone, Copy)]
pub enum TokenGrant<'a> {
    DeviceCode(&'a str),
    RefreshToken(&'a str),
}

impl TokenGrant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::DeviceCode(_) => DEVICE_CODE_GRANT_TYPE,
            Self::RefreshToken(_) => REFRESH_TOKEN_GRANT_TYPE,
        }
    }

    fn form<'a>(&'a self, client_id: &'a str) -> [(&'static str, &'a str); 3] {
        let credential = match self {
            Self::DeviceCode(code) => ("device_code", *code),
            Self::RefreshToken(token) => ("refresh_token", *token),
        };
        [
            ("grant_type", self.grant_type()),
            ("client_id", client_id),
            credential,
        ]
    }
}

/// Posts grants to a provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    client: reqwest::Client,
}

impl TokenEndpoint {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Exchange `grant` for tokens. Statuses outside `accepted` are a
    /// protocol failure; the body of an accepted status must decode.
    pub async fn exchange(
        &self,
        provider: &AuthProvider,
        grant: TokenGrant<'_>,
        accepted: &[StatusCode],
    ) -> Result<TokenResponse, AuthError> {
        if provider.token_url.is_empty() || provider.client_id.is_empty() {
            return Err(AuthError::Protocol(format!(
                "provider '{}' has no token endpoint or client id",
                provider.id
            )));
        }
        let resp = self
            .client
            .post(&provider.token_url)
            .header("Accept", "application/json")
            .form(&grant.form(&provider.client_id))
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("Cannot request tokens - {e}")))?;
        let status = resp.status();
        if !accepted.contains(&status) {
            return Err(AuthError::Protocol(format!(
                "Token request returned {} ({})",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            )));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| AuthError::Transport(format!("Cannot read token response - {e}")))?;
        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::Protocol(format!("Cannot decode token response - {e}")))?;
        tracing::debug!(
            grant_type = grant.grant_type(),
            status = status.as_u16(),
            error = response.error.as_deref().unwrap_or(""),
            "token endpoint replied"
        );
        Ok(response)
    }
}
