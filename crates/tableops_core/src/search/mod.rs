//! Search over mapped records.
//!
//! # Responsibility
//! - Generate database search restrictions from free text.
//! - Match already loaded records in memory.

pub mod filter;
pub mod matcher;

pub use filter::{search_restriction, search_terms};
pub use matcher::is_search_match;
