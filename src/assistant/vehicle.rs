//! Vehicle context extraction and diagnostic-code detection
//!
//! Free-text user messages often carry the vehicle ("I have a 2015 Toyota
//! Camry...") and OBD-II trouble codes ("P0300"). This module pulls both out
//! with lightweight regex/keyword matching so the response pipeline can
//! enrich prompts. Extraction is best-effort: no match means no context, and
//! last-write-wins when several messages mention a vehicle.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Makes recognized by the keyword matcher.
///
/// Matching is case-insensitive; multi-word makes appear in their common
/// single-token spellings ("alfa" covers "Alfa Romeo" well enough for
/// prompting purposes).
const KNOWN_MAKES: &[&str] = &[
    "acura", "alfa", "audi", "bmw", "buick", "cadillac", "chevrolet", "chevy", "chrysler",
    "dodge", "fiat", "ford", "genesis", "gmc", "honda", "hyundai", "infiniti", "jaguar", "jeep",
    "kia", "land", "lexus", "lincoln", "mazda", "mercedes", "mini", "mitsubishi", "nissan",
    "porsche", "ram", "subaru", "suzuki", "tesla", "toyota", "volkswagen", "volvo", "vw",
];

/// Vehicle context used to enrich assistant prompts
///
/// Not persisted independently; carried alongside the conversation and
/// injected into completion payloads as a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleContext {
    /// Model year as written by the user (e.g. "2015")
    pub year: String,
    /// Manufacturer, capitalized (e.g. "Toyota")
    pub make: String,
    /// Model as written by the user (e.g. "Camry")
    pub model: String,
}

impl fmt::Display for VehicleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)
    }
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19[6-9]\d|20[0-4]\d)\b").expect("static regex"))
}

fn dtc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b([PBCU][0-9]{4})\b").expect("static regex"))
}

/// Extract a vehicle from free text
///
/// Requires both a plausible model year (1960-2049) and a known make; the
/// model is the token following the make, with trailing punctuation trimmed.
/// Returns `None` when either part is missing, so ordinary questions ("How
/// do I change oil?") never produce a phantom vehicle.
///
/// # Examples
///
/// ```
/// use gasket::assistant::extract_vehicle_info;
///
/// let vehicle = extract_vehicle_info("I have a 2015 Toyota Camry with a rattle").unwrap();
/// assert_eq!(vehicle.year, "2015");
/// assert_eq!(vehicle.make, "Toyota");
/// assert_eq!(vehicle.model.to_lowercase(), "camry");
///
/// assert!(extract_vehicle_info("How do I change oil?").is_none());
/// ```
pub fn extract_vehicle_info(text: &str) -> Option<VehicleContext> {
    let year = year_regex().find(text)?.as_str().to_string();

    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (idx, token) in tokens.iter().enumerate() {
        let normalized = trim_token(token).to_lowercase();
        if KNOWN_MAKES.contains(&normalized.as_str()) {
            let model = tokens
                .get(idx + 1)
                .map(|t| trim_token(t))
                .filter(|m| !m.is_empty() && year_regex().find(m).is_none())?;
            return Some(VehicleContext {
                year,
                make: capitalize(&normalized),
                model: model.to_string(),
            });
        }
    }

    None
}

/// Scan a conversation newest-first for the most recent extractable vehicle
///
/// Implements last-write-wins over message history: a later mention
/// supersedes an earlier one.
pub fn find_vehicle_in_history<'a, I>(texts: I) -> Option<VehicleContext>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: DoubleEndedIterator,
{
    texts.into_iter().rev().find_map(extract_vehicle_info)
}

/// Detect OBD-II diagnostic trouble codes in free text
///
/// Matches the standard `[PBCU]NNNN` shape case-insensitively, uppercases
/// results, and deduplicates while preserving first-seen order.
///
/// # Examples
///
/// ```
/// use gasket::assistant::detect_dtc_codes;
///
/// let codes = detect_dtc_codes("Getting p0300 and P0171, mostly p0300");
/// assert_eq!(codes, vec!["P0300".to_string(), "P0171".to_string()]);
/// ```
pub fn detect_dtc_codes(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in dtc_regex().captures_iter(text) {
        let code = cap[1].to_uppercase();
        if !seen.contains(&code) {
            seen.push(code);
        }
    }
    seen
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
