use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::gate::GatePipeline;
use crate::session::SessionStore;
use crate::storage::DataStore;

/// Shared application state: explicitly owned stores passed into the gate
/// and the handlers, never ambient singletons, so tests can build isolated
/// instances.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub data: Arc<DataStore>,
    pub gate: Arc<GatePipeline>,
}

impl AppState {
    /// `canonical_root` must come from `storage::validate_root`.
    pub fn new(config: &AppConfig, canonical_root: PathBuf) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        let gate = Arc::new(GatePipeline::new(
            sessions.clone(),
            &config.limits,
            config.security.api_key.clone(),
        ));
        let data = Arc::new(DataStore::new(canonical_root));

        Self {
            sessions,
            data,
            gate,
        }
    }
}
