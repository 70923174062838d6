//! Gasket - automotive-assistant chat CLI
//!
#![doc = "Gasket - automotive-assistant chat CLI"]
#![doc = "Main entry point for the Gasket application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gasket::cli::{Cli, Commands};
use gasket::commands;
use gasket::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            resume,
            guest,
            vehicle,
        } => {
            tracing::info!("Starting interactive chat");
            if let Some(r) = &resume {
                tracing::debug!("Resuming session: {}", r);
            }
            if guest {
                tracing::debug!("Guest mode forced");
            }

            commands::chat::run_chat(config, resume, guest, vehicle).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(config, command).await?;
            Ok(())
        }
        Commands::Dtc { code, vehicle } => {
            tracing::info!("Looking up trouble code: {}", code);
            commands::dtc::run_dtc(config, code, vehicle).await?;
            Ok(())
        }
        Commands::Listing { url } => {
            tracing::info!("Analyzing vehicle listing");
            commands::listing::run_listing(config, url).await?;
            Ok(())
        }
        Commands::Part { photo } => {
            tracing::info!("Identifying part from photo: {}", photo.display());
            commands::parts::run_part(config, photo).await?;
            Ok(())
        }
        Commands::Sync => {
            tracing::info!("Starting guest-session sync");
            commands::sync::run_sync(config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gasket=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
