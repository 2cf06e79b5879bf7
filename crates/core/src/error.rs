//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid post id: {0}")]
    InvalidPostId(String),

    #[error("invalid post status: {0}")]
    InvalidStatus(String),

    #[error("unknown ranking kind: {0}")]
    UnknownRankKind(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
