//! Conversation history commands

use colored::Colorize;
use prettytable::{format, Table};

use crate::backend::create_backend;
use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::session::validate_session_id;

/// Handle history subcommands
pub async fn handle_history(config: Config, command: HistoryCommand) -> Result<()> {
    let backend = create_backend(&config.backend.backend_type, &config.backend)?;

    match command {
        HistoryCommand::List => {
            let sessions = backend.list_sessions(config.chat.user_id).await?;

            if sessions.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Title".bold(),
                "Created".bold(),
                "Last Updated".bold()
            ]);

            for session in sessions {
                let id = session.id.to_string();
                let id_short = &id[..8];
                let title = if session.title.chars().count() > 40 {
                    let prefix: String = session.title.chars().take(37).collect();
                    format!("{}...", prefix)
                } else {
                    session.title
                };
                let created = session.created_at.format("%Y-%m-%d %H:%M").to_string();
                let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![id_short.cyan(), title, created, updated]);
            }

            println!("\nConversation History:");
            table.printstd();
            println!();
            println!(
                "Use {} to resume a session.",
                "gasket chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let session_id = validate_session_id(&id)?;
            let messages = backend.fetch_messages(session_id).await?;

            if messages.is_empty() {
                println!("{}", "No messages in this session.".yellow());
                return Ok(());
            }

            for message in messages {
                let label = match message.sender {
                    crate::assistant::Sender::User => "you".green().bold(),
                    crate::assistant::Sender::Ai => "assistant".cyan().bold(),
                };
                println!(
                    "{} {} {}",
                    message.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    label,
                    message.text
                );
            }
        }
        HistoryCommand::Rename { id, title } => {
            let session_id = validate_session_id(&id)?;
            backend.rename_session(session_id, &title).await?;
            println!("{}", format!("Renamed session to \"{}\"", title).green());
        }
        HistoryCommand::Delete { id } => {
            let session_id = validate_session_id(&id)?;
            backend.delete_session(session_id).await?;
            println!("{}", format!("Deleted session {}", id).green());
        }
    }

    Ok(())
}
