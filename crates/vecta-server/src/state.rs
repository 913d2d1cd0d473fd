//! Shared handler state.

use std::sync::Arc;

use vecta_core::VectaCore;
use vecta_llm::AnalysisService;

use crate::config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(service: AnalysisService, config: ServiceConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    pub fn core(&self) -> Arc<VectaCore> {
        Arc::clone(self.service.core())
    }
}
