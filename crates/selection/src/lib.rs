//! The context-selection cache: decides, on every assistant turn, which
//! project files go into the next model invocation.
//!
//! A turn flows through these stages:
//!
//! 1. **Derive a key** from the last user message and the project file set
//! 2. **Exact lookup** in the TTL cache store
//! 3. **Similarity arbiter** (on miss): ask a model whether the request
//!    repeats one of the most recent cached requests
//! 4. **Context negotiation** (on arbiter miss): ask a model for a bounded
//!    include/exclude instruction set and apply it to the context buffer
//! 5. **Cache write** of the completed selection
//!
//! Only negotiation failures reach the caller. Cache bookkeeping, the
//! arbiter and the summarizer degrade instead of failing.

pub mod arbiter;
pub mod buffer;
pub mod clock;
pub mod engine;
pub mod ignore_filter;
pub mod key;
pub mod negotiator;
pub mod protocol;
pub mod provider_model;
pub mod store;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use arbiter::SimilarityArbiter;
pub use buffer::ContextBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ContextEngine, EngineSettings, SelectionOutcome, SelectionRequest, SelectionSource};
pub use ignore_filter::{IgnoreFilter, is_ignored};
pub use key::{CacheKey, derive_key, message_essence};
pub use negotiator::{ContextNegotiator, Negotiation};
pub use protocol::{SelectionInstruction, parse_selection};
pub use provider_model::ProviderModel;
pub use store::{CacheEntry, CacheStore, NewEntry, SimilarityCandidate, spawn_sweeper};
pub use summarizer::Summarizer;
