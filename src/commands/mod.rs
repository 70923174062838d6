//! Command handlers for the Gasket CLI

pub mod chat;
pub mod dtc;
pub mod history;
pub mod listing;
pub mod parts;
pub mod sync;
