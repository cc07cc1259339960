//! DocChat - conversational client for uploaded documents
//!
#![doc = "DocChat - conversational client for uploaded documents"]
#![doc = "Main entry point for the docchat command-line application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docchat::cli::{Cli, Commands};
use docchat::commands;
use docchat::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load and validate configuration
    let config = Config::load(cli.config.as_deref(), &cli)?;
    config.validate()?;

    init_tracing(&config.logging);

    match cli.command {
        Commands::Chat { target } => {
            let route = target.resolve()?;
            tracing::info!("Starting interactive chat at {}", route);
            commands::chat::run_chat(config, route).await?;
            Ok(())
        }
        Commands::Ask {
            target,
            prompt,
            json,
        } => {
            let route = target.resolve()?;
            tracing::info!("Submitting prompt to {}", route);
            commands::ask::run_ask(config, route, prompt, json).await?;
            Ok(())
        }
        Commands::New { document } => {
            tracing::info!("Creating conversation for document {}", document);
            commands::new::run_new(config, document).await?;
            Ok(())
        }
        Commands::Show { target, json } => {
            let route = target.resolve()?;
            tracing::debug!("Showing {}", route);
            commands::show::run_show(config, route, json).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// `docchat` target.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docchat={}", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
