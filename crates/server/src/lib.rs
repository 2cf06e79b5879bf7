//! HTTP API server for the Ember ephemeral board.
//!
//! This crate provides the service shell around the post store:
//! - Post creation, lookup, listing and ranking endpoints
//! - Recommend/report counters with their threshold side effects
//! - The background expiry sweeper
//! - The tagging collaborator boundary

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod sweep;
pub mod tagger;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use tagger::Tagger;
