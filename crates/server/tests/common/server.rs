//! Server test utilities.

use ember_core::config::AppConfig;
use ember_server::{AppState, Tagger, create_router};
use ember_store::{MemoryStore, PostStore};
use std::sync::Arc;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub store: Arc<dyn PostStore>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server on the in-memory store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test server with custom config modifications.
    pub fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        modifier(&mut config);

        let store: Arc<dyn PostStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone(), None);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            store,
        }
    }

    /// Create a test server with a tagger wired in.
    pub fn with_tagger(tagger: Arc<dyn Tagger>) -> Self {
        let store: Arc<dyn PostStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(AppConfig::for_testing(), store.clone(), Some(tagger));
        let router = create_router(state.clone());

        Self {
            router,
            state,
            store,
        }
    }
}
