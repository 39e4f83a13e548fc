//! Shared application state: the session registry, room hubs, and the
//! per-session domain model.

pub mod registry;
pub mod rooms;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use crate::{config::AppConfig, dao::store::GameStore, state::registry::SessionRegistry};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the session registry, the runtime
/// configuration, and the persistence collaborator.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn GameStore>,
    registry: SessionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply.
    pub fn new(config: AppConfig, store: Arc<dyn GameStore>) -> SharedState {
        Arc::new(Self {
            config,
            store,
            registry: SessionRegistry::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the persistence collaborator.
    pub fn store(&self) -> Arc<dyn GameStore> {
        self.store.clone()
    }

    /// Registry of live sessions keyed by code.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
