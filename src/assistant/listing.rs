//! Vehicle-listing analysis
//!
//! Validates listing URLs before any network call (malformed URLs and
//! unsupported marketplaces are rejected locally), then asks the assistant
//! endpoint's `listing` service for a structured analysis. A reply whose
//! analysis payload fails to parse degrades to "no analysis" rather than an
//! error, matching the rest of the parse-boundary behavior.

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::assistant::client::{CompletionClient, FunctionRequest, ServiceKind};
use crate::error::{GasketError, Result};

/// Marketplaces the listing service understands.
const SUPPORTED_DOMAINS: &[&str] = &[
    "autotrader.com",
    "cargurus.com",
    "carmax.com",
    "cars.com",
    "carvana.com",
    "craigslist.org",
    "ebay.com",
    "edmunds.com",
    "facebook.com",
    "truecar.com",
];

/// Structured vehicle-listing analysis returned by the assistant
///
/// All fields are optional or defaulted; the endpoint's JSON is loose and
/// missing fields simply stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingAnalysis {
    /// Listing title as scraped/summarized
    #[serde(default)]
    pub title: String,

    /// Asking price as displayed (string: currency formats vary)
    #[serde(default)]
    pub price: Option<String>,

    /// Vehicle year, when identified
    #[serde(default)]
    pub year: Option<String>,

    /// Vehicle make, when identified
    #[serde(default)]
    pub make: Option<String>,

    /// Vehicle model, when identified
    #[serde(default)]
    pub model: Option<String>,

    /// Odometer reading as displayed
    #[serde(default)]
    pub mileage: Option<String>,

    /// Points of concern spotted in the listing
    #[serde(default)]
    pub red_flags: Vec<String>,

    /// Overall buy/pass recommendation
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Validate a listing URL before any network call
///
/// # Errors
///
/// Returns [`GasketError::Listing`] when the URL is malformed, is not
/// http(s), or points at a marketplace the listing service does not support.
///
/// # Examples
///
/// ```
/// use gasket::assistant::validate_listing_url;
///
/// assert!(validate_listing_url("https://www.autotrader.com/cars/123").is_ok());
/// assert!(validate_listing_url("not a url").is_err());
/// assert!(validate_listing_url("https://example.com/car").is_err());
/// ```
pub fn validate_listing_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| GasketError::Listing(format!("malformed listing URL: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(GasketError::Listing(format!(
            "unsupported URL scheme: {}",
            url.scheme()
        ))
        .into());
    }

    let host = url
        .host_str()
        .ok_or_else(|| GasketError::Listing("listing URL has no host".to_string()))?;

    let supported = SUPPORTED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));
    if !supported {
        return Err(GasketError::Listing(format!(
            "unsupported listing domain: {}",
            host
        ))
        .into());
    }

    Ok(url)
}

/// Ask the listing service to analyze a validated URL
///
/// Returns `Ok(None)` when the endpoint replied but its analysis payload did
/// not parse; network and endpoint errors propagate.
pub async fn analyze_listing(
    client: &dyn CompletionClient,
    url: &Url,
) -> Result<Option<ListingAnalysis>> {
    let request = FunctionRequest {
        service: ServiceKind::Listing,
        action: "analyze".to_string(),
        data: json!({ "url": url.as_str() }),
    };

    let response = client.invoke(request).await?;

    let Some(analysis) = response.analysis else {
        tracing::debug!("listing service replied without an analysis payload");
        return Ok(None);
    };

    match serde_json::from_value::<ListingAnalysis>(analysis) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::debug!("listing analysis payload did not parse: {}", e);
            Ok(None)
        }
    }
}

/// Wrap an analysis into an assistant message for the conversation log
///
/// The display text is a readable summary; the structured payload rides in
/// the message body so callers never re-parse free text.
pub fn analysis_message(url: &Url, analysis: ListingAnalysis) -> crate::assistant::ChatMessage {
    use std::fmt::Write as _;

    let mut text = if analysis.title.is_empty() {
        format!("Here's my read on {}:", url)
    } else {
        format!("Here's my read on \"{}\":", analysis.title)
    };

    if let Some(price) = &analysis.price {
        let _ = write!(text, "\nAsking price: {}.", price);
    }
    if let Some(mileage) = &analysis.mileage {
        let _ = write!(text, "\nMileage: {}.", mileage);
    }
    for flag in &analysis.red_flags {
        let _ = write!(text, "\nWatch out: {}.", flag);
    }
    if let Some(recommendation) = &analysis.recommendation {
        let _ = write!(text, "\n{}", recommendation);
    }

    crate::assistant::ChatMessage::ai(text)
        .with_body(crate::assistant::MessageBody::ListingAnalysis(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MessageBody;

    #[test]
    fn test_validate_accepts_supported_domains() {
        assert!(validate_listing_url("https://www.cars.com/listing/42").is_ok());
        assert!(validate_listing_url("https://seattle.craigslist.org/cto/d/123.html").is_ok());
        assert!(validate_listing_url("http://autotrader.com/cars/9").is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_url() {
        let err = validate_listing_url("definitely not a url").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_validate_rejects_unsupported_domain() {
        let err = validate_listing_url("https://example.com/car/1").unwrap_err();
        assert!(err.to_string().contains("unsupported listing domain"));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let err = validate_listing_url("ftp://cars.com/listing").unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_validate_rejects_lookalike_domain() {
        // "notcars.com" must not pass the suffix check for "cars.com".
        assert!(validate_listing_url("https://notcars.com/listing").is_err());
    }

    #[test]
    fn test_analysis_message_carries_typed_body() {
        let url = Url::parse("https://www.cars.com/listing/42").unwrap();
        let analysis = ListingAnalysis {
            title: "2015 Toyota Camry SE".to_string(),
            price: Some("$11,500".to_string()),
            red_flags: vec!["salvage title".to_string()],
            ..Default::default()
        };

        let message = analysis_message(&url, analysis.clone());
        assert!(message.text.contains("2015 Toyota Camry SE"));
        assert!(message.text.contains("salvage title"));
        assert_eq!(message.body, MessageBody::ListingAnalysis(analysis));
    }

    #[test]
    fn test_analysis_parses_camel_case_payload() {
        let value = serde_json::json!({
            "title": "2015 Toyota Camry SE",
            "price": "$11,500",
            "redFlags": ["salvage title"],
            "recommendation": "negotiate"
        });
        let analysis: ListingAnalysis = serde_json::from_value(value).unwrap();
        assert_eq!(analysis.title, "2015 Toyota Camry SE");
        assert_eq!(analysis.red_flags, vec!["salvage title".to_string()]);
        assert_eq!(analysis.mileage, None);
    }
}
