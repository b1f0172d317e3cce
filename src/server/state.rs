use crate::config::ServerSettings;
use crate::core::jobs::JobStore;
use crate::domain::ports::AgentInvoker;
use std::sync::Arc;

/// Shared handler state. Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<dyn AgentInvoker>,
    pub jobs: JobStore,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(invoker: Arc<dyn AgentInvoker>, settings: ServerSettings) -> Self {
        Self {
            invoker,
            jobs: JobStore::new(),
            settings: Arc::new(settings),
        }
    }
}
