//! Error classification shared by the auth core and the CLI.

pub use crate::auth::error::{AuthError, IdentityTokenError};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The provider or deployment could not be reached.
    Transport,
    /// Unexpected status, undecodable body, or a document that breaks the schema.
    Protocol,
    /// The discovery document speaks a version this client does not understand.
    UnsupportedVersion,
    AuthorizationDenied,
    /// The device code or refresh token is no longer usable.
    CredentialExpired,
    IdentityTokenInvalid,
    Configuration,
    Storage,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    Relogin,
    UpgradeClient,
    CheckConnectivity,
    CheckConfiguration,
    ContactService,
}

impl RecoverySuggestion {
    /// Human-readable hint printed after an error.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Relogin => "Run `authctx login` to sign in again.",
            Self::UpgradeClient => "Please update this application to a newer release.",
            Self::CheckConnectivity => "Check the deployment URL and your network connection.",
            Self::CheckConfiguration => {
                "Check your contexts with `authctx context list` or create one with `authctx context set`."
            }
            Self::ContactService => "The login service misbehaved; try again later.",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
