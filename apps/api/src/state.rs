use std::sync::Arc;

use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub config: Config,
}
