//! Session module for Gasket
//!
//! This module contains session identity management, the in-memory message
//! store, the guest session cache, and the guest-to-account sync
//! coordinator.

pub mod guest;
pub mod identity;
pub mod store;
pub mod sync;

pub use guest::{
    GuestCache, GuestSessionRecord, SaveOutcome, MAX_GUEST_MESSAGES, QUOTA_FALLBACK_MESSAGES,
};
pub use identity::{ensure_chat_id, is_valid_session_id, new_session_id, validate_session_id};
pub use store::MessageStore;
pub use sync::{migrate_guest_session, SyncReport};
