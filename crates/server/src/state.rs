//! Application state shared across handlers.

use crate::tagger::Tagger;
use ember_core::config::AppConfig;
use ember_store::PostStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Post store backend.
    pub store: Arc<dyn PostStore>,
    /// Content tagger (optional).
    pub tagger: Option<Arc<dyn Tagger>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This performs configuration validation so that misconfigured thresholds
    /// are caught at startup rather than surfacing as odd behavior under load.
    ///
    /// # Panics
    ///
    /// Panics if board or sweep configuration validation fails.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PostStore>,
        tagger: Option<Arc<dyn Tagger>>,
    ) -> Self {
        if let Err(error) = config.board.validate() {
            panic!("Invalid board configuration: {}", error);
        }

        if let Err(error) = config.sweep.validate() {
            panic!("Invalid sweep configuration: {}", error);
        }

        Self {
            config: Arc::new(config),
            store,
            tagger,
        }
    }

    /// Get the sweep interval, if the background sweeper is enabled.
    /// Returns None when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.config.sweep.enabled {
            Some(self.config.sweep.interval())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::config::AppConfig;
    use ember_store::MemoryStore;

    fn build_state(config: AppConfig) -> AppState {
        let store: Arc<dyn PostStore> = Arc::new(MemoryStore::new());
        AppState::new(config, store, None)
    }

    #[test]
    fn sweep_interval_respects_config() {
        let mut config = AppConfig::for_testing();
        config.sweep.enabled = true;
        config.sweep.interval_secs = 12;

        let state = build_state(config);
        assert_eq!(state.sweep_interval(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn sweep_interval_none_when_disabled() {
        let mut config = AppConfig::for_testing();
        config.sweep.enabled = false;

        let state = build_state(config);
        assert!(state.sweep_interval().is_none());
    }

    #[test]
    #[should_panic(expected = "Invalid board configuration")]
    fn invalid_board_config_panics() {
        let mut config = AppConfig::for_testing();
        config.board.default_page_size = 500;

        build_state(config);
    }

    #[test]
    #[should_panic(expected = "Invalid sweep configuration")]
    fn zero_sweep_interval_panics() {
        let mut config = AppConfig::for_testing();
        config.sweep.enabled = true;
        config.sweep.interval_secs = 0;

        build_state(config);
    }
}
