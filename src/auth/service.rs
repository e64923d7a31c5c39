use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::device_code::{DeviceCodeRequest, DeviceCodeRequester};
use super::discovery::ProviderDiscovery;
use super::error::AuthError;
use super::identity::IdentityTokenValidator;
use super::poller::TokenPoller;
use super::progress::{ProgressSink, SilentProgress};
use super::refresh::RefreshCoordinator;
use super::token::TokenEndpoint;
use crate::config::{resolve_audience, Context, ContextStore, Settings};

/// Snapshot of a context's credential, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    pub context: String,
    pub url: String,
    pub provider_id: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub email: Option<String>,
    pub access_token_expiry: Option<DateTime<Utc>>,
    /// A stored access token is usable right now.
    pub access_token_valid: bool,
    /// A refresh token is stored, so an expired access token can be renewed silently.
    pub can_refresh: bool,
}

/// Facade over the login and refresh flows for named contexts.
///
/// All presentation goes through the [`ProgressSink`]; this type only
/// returns typed results and errors.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use authctx::auth::AuthService;
/// use authctx::config::Settings;
///
/// # async fn run() -> Result<(), authctx::auth::AuthError> {
/// let settings = Settings::from_env();
/// let store = Arc::new(settings.context_store());
/// let service = AuthService::new(&settings, store)?;
/// let token = service.access_token(None).await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    store: Arc<dyn ContextStore>,
    discovery: ProviderDiscovery,
    requester: DeviceCodeRequester,
    endpoint: TokenEndpoint,
    validator: Arc<IdentityTokenValidator>,
    refresh: RefreshCoordinator,
    progress: Arc<dyn ProgressSink>,
    audience: Option<String>,
    access_token: Option<String>,
}

impl AuthService {
    pub fn new(settings: &Settings, store: Arc<dyn ContextStore>) -> Result<Self, AuthError> {
        let client = settings.http_client()?;
        let discovery = ProviderDiscovery::new(client.clone());
        let endpoint = TokenEndpoint::new(client.clone());
        let validator = Arc::new(IdentityTokenValidator::new(client.clone()));
        let refresh = RefreshCoordinator::new(
            discovery.clone(),
            endpoint.clone(),
            validator.clone(),
            store.clone(),
        );
        Ok(Self {
            store,
            discovery,
            requester: DeviceCodeRequester::new(client),
            endpoint,
            validator,
            refresh,
            progress: Arc::new(SilentProgress),
            audience: settings.audience.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Interactive device-code login; returns the context as persisted.
    pub async fn login(&self, context: Option<&str>) -> Result<Context, AuthError> {
        let context = self.store.resolve(context)?;
        let provider = self.discovery.discover(&context.url).await?;

        let request = DeviceCodeRequest::new(&provider, self.audience_for(&context));
        let mut session = self.requester.request(&provider, &request).await?;
        self.progress.device_code_issued(&session);

        let poller = TokenPoller::new(self.endpoint.clone(), self.progress.clone());
        let response = poller.wait_for_tokens(&provider, &mut session).await?;
        let issued_at = Utc::now();

        let claims = self.validator.verified_claims(&response, &provider).await;

        let apply = |target: &mut Context| -> Result<(), AuthError> {
            target.provider_id = Some(provider.id.clone());
            target.credential.clear_tokens();
            target
                .credential
                .apply_token_response(&response, claims.as_ref(), issued_at)
        };

        let mut updated = context.clone();
        apply(&mut updated)?;
        let saved = match self.store.save(&updated) {
            Err(AuthError::ContextConflict(_)) => {
                let mut current = self
                    .store
                    .load(&context.name)?
                    .ok_or_else(|| AuthError::UnknownContext(context.name.clone()))?;
                apply(&mut current)?;
                self.store.save(&current)?
            }
            other => other?,
        };
        tracing::info!(context = %saved.name, provider = %provider.id, "login succeeded");
        Ok(saved)
    }

    /// A usable access token for the context, refreshed if it has expired.
    ///
    /// An explicitly configured access token short-circuits the store entirely.
    pub async fn access_token(&self, context: Option<&str>) -> Result<String, AuthError> {
        if let Some(token) = &self.access_token {
            tracing::debug!("using explicitly configured access token");
            return Ok(token.clone());
        }
        let context = self.store.resolve(context)?;
        self.refresh.access_token(&context).await
    }

    pub fn status(&self, context: Option<&str>) -> Result<AuthStatus, AuthError> {
        let context = self.store.resolve(context)?;
        let credential = &context.credential;
        Ok(AuthStatus {
            access_token_valid: credential.is_fresh(Utc::now()),
            can_refresh: credential.has_refresh_token(),
            account_id: credential.account_id.clone(),
            account_name: credential.account_name.clone(),
            email: credential.email.clone(),
            access_token_expiry: credential.access_token_expiry,
            provider_id: context.provider_id.clone(),
            context: context.name,
            url: context.url,
        })
    }

    /// Forget the stored tokens. Local only; nothing is revoked remotely.
    pub fn logout(&self, context: Option<&str>) -> Result<Context, AuthError> {
        let mut context = self.store.resolve(context)?;
        context.credential.clear_tokens();
        let saved = self.store.save(&context)?;
        tracing::info!(context = %saved.name, "credentials cleared");
        Ok(saved)
    }

    fn audience_for(&self, context: &Context) -> String {
        resolve_audience(self.audience.as_deref(), context)
    }
}
