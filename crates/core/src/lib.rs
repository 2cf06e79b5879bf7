//! Core domain types and shared logic for the Ember ephemeral board.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Post identifiers, statuses and the post record itself
//! - Content validation rules
//! - Ranking kinds
//! - Configuration for the server, store, board policy and sweeper

pub mod config;
pub mod error;
pub mod post;

pub use config::{AppConfig, BoardConfig, ServerConfig, StoreConfig, SweepConfig};
pub use error::{Error, Result};
pub use post::{Post, PostId, PostStatus, RankKind, RecommendOutcome, ReportOutcome};

/// Maximum post content length in characters, measured after trimming.
pub const MAX_CONTENT_CHARS: usize = 200;
