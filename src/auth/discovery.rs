//! Login-service discovery: fetch `/1/authinfo.yaml` and select the default provider.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::Deserialize;

use super::error::AuthError;

/// Path of the discovery document, relative to a deployment base URL.
pub const AUTH_INFO_PATH: &str = "/1/authinfo.yaml";
/// The only discovery document version this client understands.
pub const SUPPORTED_VERSION: u64 = 1;

/// Identity-provider descriptor from the discovery document.
///
/// Immutable once parsed; per-flow values (scopes, grant type, audience)
/// live in the request types of the step that needs them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AuthProvider {
    pub id: String,
    pub login_url: String,
    pub token_url: String,
    pub code_url: String,
    pub jwks_url: String,
    pub client_id: String,
}

/// The `auth` section of a version 1 discovery document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AuthInfo {
    pub default_provider_id: String,
    pub providers: BTreeMap<String, AuthProvider>,
}

impl AuthInfo {
    pub fn default_provider(&self) -> Result<&AuthProvider, AuthError> {
        if self.providers.is_empty() {
            return Err(AuthError::NoProviders);
        }
        self.providers
            .get(&self.default_provider_id)
            .ok_or_else(|| AuthError::NoDefaultProvider(self.default_provider_id.clone()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthInfoDocument {
    #[allow(dead_code)]
    version: u64,
    #[allow(dead_code)]
    #[serde(default)]
    fault: bool,
    auth: AuthInfo,
}

/// Fields inspected before the document is parsed against its versioned schema.
#[derive(Debug, Deserialize)]
struct DocumentHeader {
    #[serde(default)]
    fault: bool,
    version: Option<serde_yaml::Value>,
}

/// Fetches the discovery document for a deployment.
///
/// # Example
/// ```no_run
/// use authctx::auth::ProviderDiscovery;
///
/// # async fn run() -> Result<(), authctx::auth::AuthError> {
/// let discovery = ProviderDiscovery::new(reqwest::Client::new());
/// let provider = discovery.discover("https://api.example.com").await?;
/// println!("{}", provider.token_url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProviderDiscovery {
    client: reqwest::Client,
}

impl ProviderDiscovery {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch and parse the discovery document; single attempt, no retries.
    pub async fn discover(&self, base_url: &str) -> Result<AuthProvider, AuthError> {
        let url = auth_info_url(base_url)?;
        tracing::debug!(%url, "requesting login info");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("Cannot request login info - {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("Cannot read login info - {e}")))?;
        let provider = match parse_auth_info(&body) {
            Err(AuthError::ServiceFault) => return Err(AuthError::ServiceFault),
            _ if !status.is_success() => {
                return Err(AuthError::Protocol(format!(
                    "login info request returned {status}"
                )))
            }
            other => other?,
        };
        tracing::debug!(provider = %provider.id, "selected default provider");
        Ok(provider)
    }
}

/// Parse a discovery document and return its default provider.
pub fn parse_auth_info(body: &str) -> Result<AuthProvider, AuthError> {
    let header: DocumentHeader = serde_yaml::from_str(body)
        .map_err(|e| AuthError::Protocol(format!("unknown response from login service - {e}")))?;

    if header.fault {
        tracing::warn!(response = %body, "login service fault");
        return Err(AuthError::ServiceFault);
    }

    let version = header.version.ok_or_else(|| {
        tracing::warn!(response = %body, "login service provided no version info");
        AuthError::MissingVersion
    })?;
    if version.as_u64() != Some(SUPPORTED_VERSION) {
        tracing::warn!(version = %describe_version(&version), "unsupported login service version");
        return Err(AuthError::UnsupportedVersion(describe_version(&version)));
    }

    let document: AuthInfoDocument = serde_yaml::from_str(body).map_err(|e| {
        AuthError::Protocol(format!("could not process login service response - {e}"))
    })?;
    document.auth.default_provider().cloned()
}

/// `{base}/1/authinfo.yaml`, after checking `base` is an HTTP(S) origin.
pub fn auth_info_url(base_url: &str) -> Result<Url, AuthError> {
    let base = Url::parse(base_url)
        .map_err(|e| AuthError::Config(format!("invalid deployment URL '{base_url}' - {e}")))?;
    if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
        return Err(AuthError::Config(format!(
            "deployment URL '{base_url}' must be an http(s) URL"
        )));
    }
    let joined = format!("{}{AUTH_INFO_PATH}", base_url.trim_end_matches('/'));
    Url::parse(&joined)
        .map_err(|e| AuthError::Config(format!("invalid deployment URL '{base_url}' - {e}")))
}

fn describe_version(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => format!("'{s}'"),
        serde_yaml::Value::Null => "null".to_string(),
        other => format!("{other:?}"),
    }
}
