// server/src/state.rs

use crate::orchestrator::Orchestrator;

pub const SERVICE_NAME: &str = "Deep Research Agent API";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}
