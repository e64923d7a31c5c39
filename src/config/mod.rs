//! Configuration system (layered: flags > env > defaults) and the context store.

pub mod context;

pub use context::{Context, ContextStore, FileContextStore};

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AuthError;

/// Audience requested for access tokens unless a context or the environment says otherwise.
pub const DEFAULT_AUDIENCE: &str = "https://api.ivcap.net/";
/// Request timeout for every call to the login service.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const CONFIG_DIR_NAME: &str = "authctx";

pub const ENV_CONTEXT: &str = "AUTHCTX_CONTEXT";
pub const ENV_CONFIG_DIR: &str = "AUTHCTX_CONFIG_DIR";
pub const ENV_TIMEOUT: &str = "AUTHCTX_TIMEOUT";
pub const ENV_ACCESS_TOKEN: &str = "AUTHCTX_ACCESS_TOKEN";
pub const ENV_AUDIENCE: &str = "AUTHCTX_AUDIENCE";

/// Process-level settings.
///
/// # Example
/// ```no_run
/// use authctx::config::Settings;
///
/// let settings = Settings::from_env().with_context(Some("prod".to_string()));
/// let client = settings.http_client()?;
/// # Ok::<(), authctx::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_dir: PathBuf,
    /// Context to operate on; `None` means the store's active context.
    pub context: Option<String>,
    pub timeout: Duration,
    /// Explicit bearer token that bypasses the stored credential.
    pub access_token: Option<String>,
    pub audience: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
            context: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            access_token: None,
            audience: None,
        }
    }
}

impl Settings {
    /// Load from environment variables (and `.env`, if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut settings = Self::default();

        if let Some(dir) = non_empty_env(ENV_CONFIG_DIR) {
            settings.config_dir = PathBuf::from(dir);
        }
        settings.context = non_empty_env(ENV_CONTEXT);
        settings.access_token = non_empty_env(ENV_ACCESS_TOKEN);
        settings.audience = non_empty_env(ENV_AUDIENCE);
        if let Some(raw) = non_empty_env(ENV_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => settings.timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {ENV_TIMEOUT}"),
            }
        }
        settings
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        if context.is_some() {
            self.context = context;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_config_dir(mut self, dir: PathBuf) -> Self {
        self.config_dir = dir;
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.access_token = token;
        }
        self
    }

    /// `<user config dir>/authctx`.
    pub fn default_config_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(format!(".{CONFIG_DIR_NAME}")))
    }

    pub fn context_store(&self) -> FileContextStore {
        FileContextStore::new(self.config_dir.clone())
    }

    /// HTTP client shared by every step of a flow.
    pub fn http_client(&self) -> Result<reqwest::Client, AuthError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("authctx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Config(format!("cannot build HTTP client - {e}")))
    }
}

/// `explicit` if set, else the context's audience, else [`DEFAULT_AUDIENCE`].
pub fn resolve_audience(explicit: Option<&str>, context: &Context) -> String {
    explicit
        .or(context.audience.as_deref())
        .unwrap_or(DEFAULT_AUDIENCE)
        .to_string()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
