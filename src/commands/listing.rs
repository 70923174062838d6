//! Vehicle-listing analysis command

use colored::Colorize;

use crate::assistant::{
    analysis_message, analyze_listing, validate_listing_url, FunctionEndpointClient,
};
use crate::config::Config;
use crate::error::Result;

/// Validate a listing URL and print the assistant's analysis
pub async fn run_listing(config: Config, url: String) -> Result<()> {
    // Validation happens before any network call; malformed URLs and
    // unsupported marketplaces abort here.
    let url = validate_listing_url(&url)?;

    let client = FunctionEndpointClient::new(config.assistant.clone())?;
    let analysis = analyze_listing(&client, &url).await?;

    let Some(analysis) = analysis else {
        println!(
            "{}",
            "The listing was reachable but could not be analyzed.".yellow()
        );
        return Ok(());
    };

    let message = analysis_message(&url, analysis);
    println!("{} {}", "assistant>".cyan().bold(), message.text);

    Ok(())
}
