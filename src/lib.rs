//! authctx: credential lifecycle for command-line API clients.
//!
//! Logs in with the OAuth2 device authorization grant, verifies the
//! identity token against the provider's key set, persists the credential
//! per named context and silently renews it with the refresh token.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use authctx::auth::AuthService;
//! use authctx::config::Settings;
//!
//! # async fn example() -> authctx::error::Result<()> {
//! let settings = Settings::from_env();
//! let service = AuthService::new(&settings, Arc::new(settings.context_store()))?;
//! let token = service.access_token(None).await?;
//! println!("{token}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;

#[cfg(feature = "cli")]
pub mod cli;
