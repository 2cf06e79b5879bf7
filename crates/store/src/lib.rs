//! Post storage abstraction and backends for Ember.
//!
//! This crate provides:
//! - The [`PostStore`] trait: atomic counter operations, the four
//!   board indexes and expiry bookkeeping
//! - Backends: redis (hash records with native TTLs plus sorted-set
//!   indexes) and an in-memory equivalent for tests and development

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{memory::MemoryStore, redis::RedisStore};
pub use error::{StoreError, StoreResult};
pub use traits::{ActivePage, ExtensionPolicy, PostStore};

use ember_core::config::StoreConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a post store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn PostStore>> {
    config.validate().map_err(StoreError::Config)?;

    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Redis {
            url,
            prefix,
            op_timeout_secs,
        } => {
            let store = RedisStore::connect(
                url,
                prefix.clone(),
                Duration::from_secs(*op_timeout_secs),
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
