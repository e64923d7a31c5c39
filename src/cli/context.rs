//! CLI handlers for `authctx context`.

use crate::auth::discovery::auth_info_url;
use crate::auth::AuthError;
use crate::cli::SetContextArgs;
use crate::config::{Context, ContextStore};
use crate::error::Result;

/// Handle `authctx context set`: create the context or update its URL and audience.
pub fn handle_set(store: &dyn ContextStore, args: &SetContextArgs) -> Result<()> {
    let mut context = match store.load(&args.name)? {
        Some(existing) => existing,
        None => {
            let url = args.url.clone().ok_or_else(|| {
                AuthError::Config(format!("new context '{}' needs --url", args.name))
            })?;
            Context::new(args.name.clone(), url)
        }
    };
    if let Some(url) = &args.url {
        auth_info_url(url)?;
        if context.url != *url {
            // Credentials belong to the deployment they were issued by.
            context.credential.clear_tokens();
            context.provider_id = None;
        }
        context.url = url.clone();
    }
    if let Some(audience) = &args.audience {
        context.audience = Some(audience.clone()).filter(|a| !a.is_empty());
    }
    let saved = store.save(&context)?;
    println!("Context '{}' saved ({})", saved.name, saved.url);
    Ok(())
}

/// Handle `authctx context use`.
pub fn handle_use(store: &dyn ContextStore, name: &str) -> Result<()> {
    store.set_active(name)?;
    println!("Switched to context '{name}'");
    Ok(())
}

/// Handle `authctx context list`.
pub fn handle_list(store: &dyn ContextStore) -> Result<()> {
    let active = store.active()?;
    let contexts = store.list()?;
    if contexts.is_empty() {
        println!("No contexts defined. Create one with `authctx context set NAME --url URL`.");
        return Ok(());
    }
    for context in contexts {
        let marker = if active.as_deref() == Some(context.name.as_str()) { "*" } else { " " };
        let account = context
            .credential
            .email
            .as_deref()
            .or(context.credential.account_name.as_deref())
            .unwrap_or("-");
        println!("{marker} {:<16} {:<40} {account}", context.name, context.url);
    }
    Ok(())
}
