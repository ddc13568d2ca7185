//! Typed error definitions for the PLB system.
//!
//! Provides [`PlbError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the PLB system.
#[derive(Debug, Error)]
pub enum PlbError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Feed attachment or delivery error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Replay file access or format error.
    #[error("replay error: {0}")]
    Replay(String),

    /// Order record parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}
