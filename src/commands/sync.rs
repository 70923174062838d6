//! Guest-session sync command

use colored::Colorize;

use crate::backend::create_backend;
use crate::config::Config;
use crate::error::{GasketError, Result};
use crate::session::{migrate_guest_session, GuestCache};

/// Migrate a pending guest session into the configured account
pub async fn run_sync(config: Config) -> Result<()> {
    let Some(user_id) = config.chat.user_id else {
        return Err(GasketError::Sync(
            "No user id configured; set chat.user_id or pass --user".to_string(),
        )
        .into());
    };

    let cache = GuestCache::new(&config.guest)?;
    if !cache.has_guest_session() {
        println!("{}", "No guest conversation to sync.".yellow());
        return Ok(());
    }

    let backend = create_backend(&config.backend.backend_type, &config.backend)?;

    match migrate_guest_session(&cache, backend.as_ref(), user_id).await? {
        Some(report) => {
            println!(
                "{}",
                format!(
                    "Moved {} messages into session {}.",
                    report.migrated, report.session_id
                )
                .green()
            );
        }
        None => println!("{}", "No guest conversation to sync.".yellow()),
    }

    Ok(())
}
