//! Memory subsystem: the external retrieval tool adapter and everything
//! that feeds it.
//!
//! - [`exec`] — deadline-scoped subprocess runner.
//! - [`retriever`] — two-stage query/search retrieval over the tool.
//! - [`extractor`] — fire-and-forget fact extraction into daily journals.
//! - [`scheduler`] — periodic index refresh (update + embed).
//! - [`bootstrap`] — idempotent per-namespace directory trees.
//! - [`identity`] — persona hot-swap with archive isolation.

pub mod bootstrap;
pub mod exec;
pub mod extractor;
pub mod identity;
pub mod retriever;
pub mod scheduler;

pub use bootstrap::{bootstrap_namespace, BootstrapResult};
pub use identity::{AgentIdentity, HotSwapOutcome, IdentityManager, IdentityRefreshHook};
pub use exec::{TokioToolRunner, ToolCommand, ToolOutput, ToolRunner};
pub use extractor::MemoryExtractor;
pub use retriever::QmdRetriever;
pub use scheduler::IndexScheduler;
