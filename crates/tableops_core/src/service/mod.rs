//! Caller-facing adapters over the table operations engine.
//!
//! # Responsibility
//! - Offer callback-style error recovery for callers that cannot handle
//!   `Result` at every call site.
//! - Keep the engine itself free of recovery policy.

pub mod recovering;

pub use recovering::{ErrorHandler, RecoveringTableOperations};
