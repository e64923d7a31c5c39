//! Device-code token polling.
//!
//! `PENDING` until the provider answers with a terminal outcome:
//! tokens (success), `expired_token` (timed out), `access_denied` or
//! `invalid_grant` (denied). `slow_down` doubles the poll interval. The
//! device code's own expiry is enforced locally, so a provider that never
//! sends a terminal answer cannot keep the loop alive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use tokio::time::Instant;

use super::device_code::{DeviceCodePoll, DeviceCodeSession};
use super::discovery::AuthProvider;
use super::error::AuthError;
use super::progress::ProgressSink;
use super::token::{OAuthErrorCode, TokenEndpoint, TokenGrant, TokenResponse};

/// Some providers answer pending polls with 403 instead of 400.
const POLL_ACCEPTED_STATUSES: &[StatusCode] = &[StatusCode::OK, StatusCode::FORBIDDEN];

/// Floor for the wait between polls, whatever interval the provider declares.
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// Upper bound on how long a single login may poll.
const MAX_POLL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

pub struct TokenPoller {
    endpoint: TokenEndpoint,
    progress: Arc<dyn ProgressSink>,
}

impl TokenPoller {
    pub fn new(endpoint: TokenEndpoint, progress: Arc<dyn ProgressSink>) -> Self {
        Self { endpoint, progress }
    }

    /// One poll of the token endpoint.
    ///
    /// Terminal failures come back as errors; `SlowDown` carries the
    /// doubled interval for the caller to adopt.
    pub async fn poll_once(
        &self,
        provider: &AuthProvider,
        session: &DeviceCodeSession,
    ) -> Result<DeviceCodePoll, AuthError> {
        let response = self
            .endpoint
            .exchange(
                provider,
                TokenGrant::DeviceCode(&session.device_code),
                POLL_ACCEPTED_STATUSES,
            )
            .await?;
        match response.error_code() {
            None => {
                response.ensure_access_token()?;
                Ok(DeviceCodePoll::Authorized { response })
            }
            Some(OAuthErrorCode::AuthorizationPending) => Ok(DeviceCodePoll::Pending {
                interval_secs: session.interval_secs,
            }),
            Some(OAuthErrorCode::SlowDown) => Ok(DeviceCodePoll::SlowDown {
                interval_secs: session.interval_secs.saturating_mul(2),
            }),
            Some(OAuthErrorCode::ExpiredToken) => Err(AuthError::LoginTimedOut),
            Some(OAuthErrorCode::AccessDenied) => Err(AuthError::AccessDenied),
            Some(OAuthErrorCode::InvalidGrant) => Err(AuthError::InvalidCredentials),
            Some(OAuthErrorCode::Other(code)) => Err(AuthError::Protocol(format!(
                "unexpected token error '{code}'"
            ))),
        }
    }

    /// Poll until the provider issues tokens, refuses, or the device code expires.
    pub async fn wait_for_tokens(
        &self,
        provider: &AuthProvider,
        session: &mut DeviceCodeSession,
    ) -> Result<TokenResponse, AuthError> {
        let started = Instant::now();
        let window = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default()
            .min(MAX_POLL_WINDOW);
        let deadline = started + window;
        let mut last_elapsed = 0i64;
        loop {
            if Instant::now() >= deadline {
                tracing::debug!("device code expired locally");
                return Err(AuthError::LoginTimedOut);
            }

            match self.poll_once(provider, session).await? {
                DeviceCodePoll::Authorized { response } => return Ok(response),
                DeviceCodePoll::Pending { .. } => {}
                DeviceCodePoll::SlowDown { interval_secs } => {
                    tracing::debug!(interval_secs, "provider asked to slow down");
                    session.interval_secs = interval_secs;
                }
            }

            let elapsed = i64::try_from(started.elapsed().as_secs()).unwrap_or(i64::MAX);
            if elapsed / 60 != last_elapsed / 60 {
                self.progress
                    .time_remaining(session.expires_in.saturating_sub(elapsed));
            }
            last_elapsed = elapsed;

            let interval = Duration::from_secs(session.interval_secs.max(MIN_POLL_INTERVAL_SECS));
            let wait = interval.min(deadline.saturating_duration_since(Instant::now()));
            tokio::time::sleep(wait).await;
        }
    }
}
