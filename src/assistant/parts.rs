//! Part identification from photos
//!
//! Local validation happens before any network call: the file must decode as
//! a known image format and stay under the size cap. Valid photos are
//! base64-encoded into the `image` service payload.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

use crate::assistant::client::{CompletionClient, FunctionRequest, ServiceKind};
use crate::error::{GasketError, Result};

/// Maximum accepted photo size in bytes.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Structured part identification returned by the assistant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartIdentification {
    /// Common name of the identified part
    #[serde(default)]
    pub name: String,

    /// What the part does
    #[serde(default)]
    pub description: Option<String>,

    /// System the part belongs to (brakes, cooling, ...)
    #[serde(default)]
    pub category: Option<String>,

    /// Typical replacement cost range as displayed text
    #[serde(default)]
    pub replacement_cost: Option<String>,
}

/// Load and validate a part photo, returning its base64 payload
///
/// # Errors
///
/// Returns [`GasketError::PartPhoto`] when the file exceeds
/// [`MAX_IMAGE_BYTES`] or does not decode as a known image format.
pub fn load_part_photo(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| GasketError::PartPhoto(format!("could not read {}: {}", path.display(), e)))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(GasketError::PartPhoto(format!(
            "photo is {} bytes, over the {} byte limit",
            bytes.len(),
            MAX_IMAGE_BYTES
        ))
        .into());
    }

    let format = image::guess_format(&bytes)
        .map_err(|_| GasketError::PartPhoto("file is not a recognized image".to_string()))?;
    tracing::debug!("part photo validated as {:?}, {} bytes", format, bytes.len());

    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Ask the image service to identify the part in a photo
///
/// Returns `Ok(None)` when the endpoint replied but its parts payload did
/// not parse; validation and transport errors propagate.
pub async fn identify_part(
    client: &dyn CompletionClient,
    photo_path: &Path,
) -> Result<Option<PartIdentification>> {
    let encoded = load_part_photo(photo_path)?;

    let request = FunctionRequest {
        service: ServiceKind::Image,
        action: "identify".to_string(),
        data: json!({ "image": encoded }),
    };

    let response = client.invoke(request).await?;

    let Some(parts) = response.parts else {
        tracing::debug!("image service replied without a parts payload");
        return Ok(None);
    };

    match serde_json::from_value::<PartIdentification>(parts) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::debug!("part identification payload did not parse: {}", e);
            Ok(None)
        }
    }
}
