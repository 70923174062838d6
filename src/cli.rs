//! Command-line interface definition for Gasket
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, history management, diagnostic
//! lookup, listing analysis, part identification, and guest-session sync.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gasket - automotive-assistant chat CLI
///
/// Chat with an automotive assistant about diagnostics, repairs, parts,
/// and vehicle listings, with conversation history persisted to a hosted
/// store or a local database.
#[derive(Parser, Debug, Clone)]
#[command(name = "gasket")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the backend from config (rest, sqlite)
    #[arg(long, env = "GASKET_BACKEND")]
    pub backend: Option<String>,

    /// Authenticated user id (UUID); omit for guest mode
    #[arg(long, env = "GASKET_USER_ID")]
    pub user: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Gasket
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume an existing session by id (UUID)
        #[arg(short, long)]
        resume: Option<String>,

        /// Force guest mode even when a user id is configured
        #[arg(short, long)]
        guest: bool,

        /// Preselect a vehicle, e.g. "2015 Toyota Camry"
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Manage conversation history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Look up an OBD-II diagnostic trouble code
    Dtc {
        /// The trouble code, e.g. P0300
        code: String,

        /// Vehicle the code was read from, e.g. "2015 Toyota Camry"
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Analyze a vehicle listing URL
    Listing {
        /// Listing URL from a supported marketplace
        url: String,
    },

    /// Identify a part from a photo
    Part {
        /// Path to the photo
        photo: PathBuf,
    },

    /// Migrate a pending guest session into the configured account
    Sync,
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored sessions
    List,

    /// Show a session's messages
    Show {
        /// Session id (UUID)
        id: String,
    },

    /// Rename a session (does not change its position in the list)
    Rename {
        /// Session id (UUID)
        id: String,

        /// New title
        title: String,
    },

    /// Delete a session and its messages
    Delete {
        /// Session id (UUID)
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat_command() {
        let cli = Cli::try_parse_from(["gasket", "chat", "--guest"]).unwrap();
        match cli.command {
            Commands::Chat { guest, resume, .. } => {
                assert!(guest);
                assert!(resume.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_history_list() {
        let cli = Cli::try_parse_from(["gasket", "history", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                command: HistoryCommand::List
            }
        ));
    }

    #[test]
    fn test_cli_parses_dtc_with_vehicle() {
        let cli =
            Cli::try_parse_from(["gasket", "dtc", "P0300", "--vehicle", "2015 Toyota Camry"])
                .unwrap();
        match cli.command {
            Commands::Dtc { code, vehicle } => {
                assert_eq!(code, "P0300");
                assert_eq!(vehicle.as_deref(), Some("2015 Toyota Camry"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["gasket"]).is_err());
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["gasket", "sync"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("config/config.yaml"));
    }
}
