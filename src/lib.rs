//! Gasket - automotive-assistant chat orchestrator
//!
//! This library provides the core functionality for the Gasket automotive
//! assistant: chat session orchestration, pluggable persistence backends,
//! guest-session caching with account migration, and the LLM-backed
//! response pipeline.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Session identity, the in-memory message store, the guest
//!   cache, and the sync coordinator
//! - `backend`: Chat persistence abstraction and implementations (REST,
//!   SQLite, in-memory fake) plus the realtime listener
//! - `assistant`: Message types, the function-endpoint client, the response
//!   pipeline, and automotive helpers (vehicle extraction, DTC detection,
//!   listing analysis, part identification)
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use gasket::assistant::{ChatMessage, FunctionEndpointClient, ResponsePipeline};
//! use gasket::backend::{ChatBackend, FakeBackend};
//! use gasket::session::MessageStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = FakeBackend::new();
//!     let session_id = backend.create_session("Brake noise", None).await?;
//!
//!     let mut store = MessageStore::with_session(session_id);
//!     let message = ChatMessage::user("My brakes squeal when stopping");
//!     store.append(message.clone());
//!     backend.store_user_message(&message, session_id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use assistant::{ChatMessage, MessageBody, ResponsePipeline, Sender, VehicleContext};
pub use backend::{ChatBackend, ChatSession};
pub use config::Config;
pub use error::{GasketError, Result};
pub use session::{ensure_chat_id, GuestCache, MessageStore};
