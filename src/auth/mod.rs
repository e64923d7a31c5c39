//! OAuth device-code login, identity verification and silent token refresh.

pub mod credential;
pub mod device_code;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod poller;
pub mod progress;
pub mod refresh;
pub mod service;
pub mod token;

pub use credential::Credential;
pub use device_code::{DeviceCodePoll, DeviceCodeRequest, DeviceCodeRequester, DeviceCodeSession};
pub use discovery::{AuthInfo, AuthProvider, ProviderDiscovery};
pub use error::{AuthError, IdentityTokenError};
pub use identity::{IdentityClaims, IdentityTokenValidator};
pub use poller::TokenPoller;
pub use progress::{ProgressSink, SilentProgress};
pub use refresh::RefreshCoordinator;
pub use service::{AuthService, AuthStatus};
pub use token::{OAuthErrorCode, TokenEndpoint, TokenGrant, TokenResponse};
