//! Session identity management
//!
//! Session identifiers are UUIDv4, minted client-side so that optimistic
//! local state, persistence rows, and realtime echoes all agree on identity.
//! Validation lives here, at the caller boundary: persistence adapters
//! reject malformed ids loudly instead of quietly substituting their own.

use uuid::{Uuid, Version};

use crate::error::{GasketError, Result};

/// Mint a fresh session identifier
pub fn new_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Check whether a string is a well-formed UUIDv4 session id
///
/// # Examples
///
/// ```
/// use gasket::session::is_valid_session_id;
///
/// assert!(is_valid_session_id("67e55044-10b1-426f-9247-bb680e5fe0c8"));
/// assert!(!is_valid_session_id("not-a-uuid"));
/// ```
pub fn is_valid_session_id(raw: &str) -> bool {
    matches!(Uuid::parse_str(raw), Ok(id) if id.get_version() == Some(Version::Random))
}

/// Parse and validate a session id, failing loudly on malformed input
///
/// # Errors
///
/// Returns [`GasketError::InvalidSessionId`] when `raw` is not a
/// well-formed UUIDv4.
pub fn validate_session_id(raw: &str) -> Result<Uuid> {
    let id = Uuid::parse_str(raw)
        .map_err(|_| GasketError::InvalidSessionId(raw.to_string()))?;
    if id.get_version() != Some(Version::Random) {
        return Err(GasketError::InvalidSessionId(raw.to_string()).into());
    }
    Ok(id)
}

/// Return the current id when it is a valid UUIDv4, otherwise mint a new one
///
/// This is the only place session ids come from; every persistence call is
/// guaranteed a well-formed id because callers route through here first.
///
/// # Examples
///
/// ```
/// use gasket::session::ensure_chat_id;
///
/// let existing = "67e55044-10b1-426f-9247-bb680e5fe0c8";
/// assert_eq!(ensure_chat_id(Some(existing)).to_string(), existing);
///
/// let minted = ensure_chat_id(Some("garbage"));
/// assert_ne!(minted.to_string(), "garbage");
/// ```
pub fn ensure_chat_id(current: Option<&str>) -> Uuid {
    match current {
        Some(raw) => match validate_session_id(raw) {
            Ok(id) => id,
            Err(_) => {
                tracing::debug!("replacing malformed session id {:?}", raw);
                new_session_id()
            }
        },
        None => new_session_id(),
    }
}
