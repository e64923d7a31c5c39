use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::discovery::AuthProvider;
use super::error::AuthError;
use super::token::TokenResponse;

/// Scopes requested for interactive login; `offline_access` makes the
/// provider issue a refresh token.
pub const DEVICE_SCOPES: &str = "openid profile email offline_access";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Device-code session details returned by the provider.
///
/// # Example
/// ```no_run
/// use authctx::auth::DeviceCodeSession;
/// use chrono::{Duration, Utc};
///
/// let issued_at = Utc::now();
/// let session = DeviceCodeSession {
///     device_code: "device-code".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_url: "https://login.example/activate".to_string(),
///     verification_url_complete: None,
///     expires_in: 900,
///     interval_secs: 5,
///     issued_at,
///     expires_at: issued_at + Duration::seconds(900),
/// };
/// assert_eq!(session.display_url(), "https://login.example/activate");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub verification_url_complete: Option<String>,
    /// Lifetime of the device code in seconds, as declared by the provider.
    pub expires_in: i64,
    /// Current poll interval; doubled on `slow_down`.
    pub interval_secs: u64,
    pub issued_at: DateTime<Utc>,
    /// Local deadline derived from `expires_in`; polling never runs past it.
    pub expires_at: DateTime<Utc>,
}

impl DeviceCodeSession {
    /// URL to show the user, preferring the variant with the code embedded.
    pub fn display_url(&self) -> &str {
        self.verification_url_complete
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.verification_url)
    }
}

/// Outcome of a single poll of the token endpoint.
#[derive(Debug, Clone)]
pub enum DeviceCodePoll {
    Pending { interval_secs: u64 },
    SlowDown { interval_secs: u64 },
    Authorized { response: TokenResponse },
}

/// Form body of a device-code request, built fresh for every login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeRequest {
    pub client_id: String,
    pub scope: String,
    pub audience: String,
}

impl DeviceCodeRequest {
    pub fn new(provider: &AuthProvider, audience: impl Into<String>) -> Self {
        Self {
            client_id: provider.client_id.clone(),
            scope: DEVICE_SCOPES.to_string(),
            audience: audience.into(),
        }
    }

    fn form(&self) -> [(&'static str, &str); 3] {
        [
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
            ("audience", self.audience.as_str()),
        ]
    }
}

/// Requests a device code from the provider's code endpoint.
#[derive(Debug, Clone)]
pub struct DeviceCodeRequester {
    client: reqwest::Client,
}

impl DeviceCodeRequester {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Single attempt; any failure aborts the login.
    pub async fn request(
        &self,
        provider: &AuthProvider,
        request: &DeviceCodeRequest,
    ) -> Result<DeviceCodeSession, AuthError> {
        if provider.code_url.is_empty() || request.client_id.is_empty() {
            return Err(AuthError::Protocol(format!(
                "provider '{}' has no device code endpoint or client id",
                provider.id
            )));
        }
        let resp = self
            .client
            .post(&provider.code_url)
            .header("Accept", "application/json")
            .form(&request.form())
            .send()
            .await
            .map_err(|e| {
                AuthError::Transport(format!("Cannot request authentication device code - {e}"))
            })?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(AuthError::Protocol(format!(
                "Device code request returned {} ({})",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            )));
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        let issued_at = Utc::now();
        let expires_at = Duration::try_seconds(payload.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Protocol(format!(
                    "device code lifetime {}s out of range",
                    payload.expires_in
                ))
            })?;
        tracing::debug!(
            expires_in = payload.expires_in,
            interval = payload.interval,
            "device code issued"
        );
        Ok(DeviceCodeSession {
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_url: payload.verification_uri,
            verification_url_complete: payload.verification_uri_complete,
            expires_in: payload.expires_in,
            interval_secs: payload.interval,
            issued_at,
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    expires_in: i64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
