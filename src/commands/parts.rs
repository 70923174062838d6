//! Part identification command

use colored::Colorize;
use std::path::PathBuf;

use crate::assistant::{identify_part, FunctionEndpointClient};
use crate::config::Config;
use crate::error::Result;

/// Identify the part in a photo and print what the assistant found
pub async fn run_part(config: Config, photo: PathBuf) -> Result<()> {
    let client = FunctionEndpointClient::new(config.assistant.clone())?;

    // Photo validation (image format, size cap) happens inside and aborts
    // before any network call.
    let part = identify_part(&client, &photo).await?;

    let Some(part) = part else {
        println!("{}", "Could not identify the part in that photo.".yellow());
        return Ok(());
    };

    println!("{}", part.name.bold());
    if let Some(category) = &part.category {
        println!("  System: {}", category);
    }
    if let Some(description) = &part.description {
        println!("  {}", description);
    }
    if let Some(cost) = &part.replacement_cost {
        println!("  Typical replacement: {}", cost);
    }

    Ok(())
}
