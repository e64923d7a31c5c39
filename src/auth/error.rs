use thiserror::Error;

use crate::error::{ErrorCategory, RecoverySuggestion};

/// Errors surfaced by discovery, the device flow, refresh and the context store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Cannot reach login service: {0}")]
    Transport(String),
    #[error("Unexpected response from login service: {0}")]
    Protocol(String),
    #[error("Login service has returned a fault")]
    ServiceFault,
    #[error("Login service returned an invalid response (no version info)")]
    MissingVersion,
    #[error("Client out of date (login service version {0}): please update this application")]
    UnsupportedVersion(String),
    #[error("Login service returned invalid data (no providers)")]
    NoProviders,
    #[error("Login service returned invalid data (no default provider '{0}')")]
    NoDefaultProvider(String),
    #[error("The login process was not completed in time - please login again")]
    LoginTimedOut,
    #[error("Could not login - access was denied")]
    AccessDenied,
    #[error("Could not login - invalid credentials")]
    InvalidCredentials,
    #[error("Could not login - expired credentials. Please use the login command to refresh your credentials")]
    CredentialExpired,
    #[error("Could not login - invalid credentials. Please use the login command to refresh your credentials")]
    NotLoggedIn,
    #[error(transparent)]
    IdentityToken(#[from] IdentityTokenError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cannot find suitable context. Use '--context' or set a default with 'context use'")]
    NoActiveContext,
    #[error("Unknown context '{0}'")]
    UnknownContext(String),
    #[error("Context '{0}' was modified by another process")]
    ContextConflict(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Reasons an identity token was rejected.
#[derive(Debug, Error)]
pub enum IdentityTokenError {
    #[error("Malformed ID token received - {0}")]
    Malformed(String),
    #[error("Expired ID token received - {0}")]
    Expired(String),
    #[error("Cannot verify ID token - {0}")]
    Verification(String),
    #[error("Cannot fetch ID token key set - {0}")]
    KeySet(String),
}

impl AuthError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Protocol(_)
            | Self::ServiceFault
            | Self::MissingVersion
            | Self::NoProviders
            | Self::NoDefaultProvider(_) => ErrorCategory::Protocol,
            Self::UnsupportedVersion(_) => ErrorCategory::UnsupportedVersion,
            Self::AccessDenied | Self::InvalidCredentials => ErrorCategory::AuthorizationDenied,
            Self::LoginTimedOut | Self::CredentialExpired | Self::NotLoggedIn => {
                ErrorCategory::CredentialExpired
            }
            Self::IdentityToken(_) => ErrorCategory::IdentityTokenInvalid,
            Self::Config(_) | Self::NoActiveContext | Self::UnknownContext(_) => {
                ErrorCategory::Configuration
            }
            Self::ContextConflict(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorCategory::Storage
            }
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Transport => RecoverySuggestion::CheckConnectivity,
            ErrorCategory::Protocol => RecoverySuggestion::ContactService,
            ErrorCategory::UnsupportedVersion => RecoverySuggestion::UpgradeClient,
            ErrorCategory::AuthorizationDenied
            | ErrorCategory::CredentialExpired
            | ErrorCategory::IdentityTokenInvalid => RecoverySuggestion::Relogin,
            ErrorCategory::Configuration | ErrorCategory::Storage => {
                RecoverySuggestion::CheckConfiguration
            }
        }
    }

    /// Whether the caller must run an interactive login before retrying.
    pub fn requires_login(&self) -> bool {
        self.recovery_suggestion() == RecoverySuggestion::Relogin
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_yaml::Error> for AuthError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for IdentityTokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match error.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(error.to_string()),
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                Self::Expired(error.to_string())
            }
            _ => Self::Verification(error.to_string()),
        }
    }
}
