//! # Eidolon Core
//!
//! Domain types, traits, and error definitions for the Eidolon roleplay
//! agent runtime. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (chat platform, LLM backend, retrieval
//! tool) is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod env;
pub mod error;
pub mod memory;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{HistoryProvider, ReplySender};
pub use env::ProcessEnv;
pub use error::{ChannelError, CompletionError, Error, PersonaError, Result};
pub use memory::{
    MemoryRecord, MemoryRetrieval, RetrievalError, RetrievalFailure, RetrievalMode,
    RetrievalResult,
};
pub use message::{IncomingMessage, RawMessage, RecentMessage, Role};
pub use persona::CharacterCard;
pub use provider::{CompletionClient, CompletionRequest, CompletionResponse};
