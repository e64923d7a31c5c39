//! CLI handlers for login, token, status, and logout.

use std::sync::Arc;

use chrono::Utc;
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;

use crate::auth::{AuthService, DeviceCodeSession, ProgressSink};
use crate::config::{ContextStore, Settings};
use crate::error::Result;

/// Prints login progress to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn device_code_issued(&self, session: &DeviceCodeSession) {
        let url = session.display_url();
        match render_qr(url) {
            Some(qr) => println!("{qr}"),
            None => tracing::debug!("verification URL too long for a QR code"),
        }
        println!("Code:   {}", session.user_code);
        println!("Verify: {url}");
        println!();
        println!("Waiting for authorization...");
    }

    fn time_remaining(&self, seconds: i64) {
        println!("Time remaining: {} seconds", seconds.max(0));
    }
}

fn render_qr(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    Some(
        code.render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}

fn service(settings: &Settings, store: Arc<dyn ContextStore>) -> Result<AuthService> {
    Ok(AuthService::new(settings, store)?.with_progress(Arc::new(ConsoleProgress)))
}

/// Handle `authctx login`.
pub async fn handle_login(
    settings: &Settings,
    store: Arc<dyn ContextStore>,
) -> Result<()> {
    let service = service(settings, store)?;
    let context = service.login(settings.context.as_deref()).await?;
    let who = context
        .credential
        .account_name
        .as_deref()
        .or(context.credential.email.as_deref())
        .unwrap_or("unknown account");
    println!("Success: You are authorized as '{who}' on '{}'", context.name);
    Ok(())
}

/// Handle `authctx token`: the token alone goes to stdout.
pub async fn handle_token(
    settings: &Settings,
    store: Arc<dyn ContextStore>,
) -> Result<()> {
    let token = service(settings, store)?
        .access_token(settings.context.as_deref())
        .await?;
    println!("{token}");
    Ok(())
}

/// Handle `authctx status`.
pub fn handle_status(settings: &Settings, store: Arc<dyn ContextStore>) -> Result<()> {
    let status = service(settings, store)?.status(settings.context.as_deref())?;
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("Context:   {}", status.context);
    println!("URL:       {}", status.url);
    println!("Provider:  {}", show(&status.provider_id));
    println!("Account:   {}", show(&status.account_id));
    println!("Name:      {}", show(&status.account_name));
    println!("Email:     {}", show(&status.email));
    match status.access_token_expiry {
        Some(expiry) if status.access_token_valid => {
            let left = (expiry - Utc::now()).num_minutes();
            println!("Token:     valid until {} ({left} min)", expiry.to_rfc3339());
        }
        Some(expiry) => println!("Token:     expired at {}", expiry.to_rfc3339()),
        None => println!("Token:     none"),
    }
    println!(
        "Refresh:   {}",
        if status.can_refresh { "available" } else { "not available" }
    );
    Ok(())
}

/// Handle `authctx logout`.
pub fn handle_logout(settings: &Settings, store: Arc<dyn ContextStore>) -> Result<()> {
    let context = service(settings, store)?.logout(settings.context.as_deref())?;
    println!("Logged out of '{}'", context.name);
    Ok(())
}
