//! Application state shared across routes

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::game::SessionRegistry;
use crate::store::SharedStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub sessions: Arc<SessionRegistry>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let store = SharedStore::new(config.channel_capacity);
        let sessions = Arc::new(SessionRegistry::new());

        Self {
            config,
            store,
            sessions,
            started_at: Utc::now(),
        }
    }
}
