//! # filescope Core
//!
//! Domain types, traits, and error definitions for the filescope
//! context-selection cache. This crate has **no framework dependencies**: it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! External collaborators are defined as traits here. Implementations live in
//! their respective crates. This enables:
//! - Swapping the LLM backend via configuration
//! - Deterministic fakes in tests
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod files;
pub mod message;
pub mod model;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, SelectionError};
pub use files::{FileEntry, FileKind, FileMap};
pub use message::{ContentSegment, Message, MessageContent, Role};
pub use model::{Completion, ContextModel, Prompt};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
