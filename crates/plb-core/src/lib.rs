//! # plb-core
//!
//! Core crate for the PLB price-level book aggregator, providing:
//!
//! - **Types** (`types`) — order events, live-order entries, price levels,
//!   change-sets, side enums
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `PlbError` via thiserror
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
