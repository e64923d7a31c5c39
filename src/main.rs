//! authctx CLI binary entry point.

use std::sync::Arc;

use authctx::cli::{Cli, Commands, ContextCommands, LogFormat};
use authctx::config::ContextStore;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.debug, cli.log_format);

    let settings = cli.settings();
    let store: Arc<dyn ContextStore> = Arc::new(settings.context_store());

    let result = match &cli.command {
        Commands::Login => authctx::cli::auth::handle_login(&settings, store).await,
        Commands::Token => authctx::cli::auth::handle_token(&settings, store).await,
        Commands::Status => authctx::cli::auth::handle_status(&settings, store),
        Commands::Logout => authctx::cli::auth::handle_logout(&settings, store),
        Commands::Context(args) => match &args.command {
            ContextCommands::Set(set) => authctx::cli::context::handle_set(store.as_ref(), set),
            ContextCommands::Use { name } => authctx::cli::context::handle_use(store.as_ref(), name),
            ContextCommands::List => authctx::cli::context::handle_list(store.as_ref()),
        },
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        eprintln!("{}", e.recovery_suggestion().hint());
        std::process::exit(1);
    }
}

/// Logs go to stderr so `authctx token` output stays clean.
fn init_tracing(debug: bool, format: LogFormat) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        LogFormat::Text => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
