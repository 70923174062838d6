//! Diagnostic trouble-code lookup command

use colored::Colorize;
use serde_json::json;

use crate::assistant::{
    detect_dtc_codes, extract_vehicle_info, CompletionClient, FunctionEndpointClient,
    FunctionRequest, ServiceKind, ASK_VEHICLE_REPLY,
};
use crate::config::Config;
use crate::error::{GasketError, Result};

/// Look up a single trouble code via the diagnostic service
///
/// The ask-for-vehicle-first rule applies here too: without a vehicle the
/// command prints the vehicle prompt and never calls the endpoint.
pub async fn run_dtc(config: Config, code: String, vehicle: Option<String>) -> Result<()> {
    let detected = detect_dtc_codes(&code);
    let normalized = match detected.as_slice() {
        [only] if only.len() == code.trim().len() => only.clone(),
        _ => {
            return Err(GasketError::Assistant(format!(
                "{:?} is not a valid trouble code (expected e.g. P0300)",
                code
            ))
            .into())
        }
    };

    let vehicle = vehicle
        .or_else(|| config.chat.vehicle.clone())
        .and_then(|raw| extract_vehicle_info(&raw));

    let Some(vehicle) = vehicle else {
        println!("{}", ASK_VEHICLE_REPLY.yellow());
        return Ok(());
    };

    let client = FunctionEndpointClient::new(config.assistant.clone())?;
    let response = client
        .invoke(FunctionRequest {
            service: ServiceKind::Diagnostic,
            action: "lookup".to_string(),
            data: json!({
                "code": normalized,
                "vehicle": vehicle.to_string(),
            }),
        })
        .await?;

    match response.reply_text() {
        Some(text) => {
            println!("{} {}", format!("{}:", normalized).cyan().bold(), text);
        }
        None => println!(
            "{}",
            format!("No information available for {}.", normalized).yellow()
        ),
    }

    Ok(())
}
