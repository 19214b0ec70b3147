use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::middleware::RequestLimiter;
use crate::services::{AnalysisService, DocumentNormalizer, GeminiAnalysisService, SessionStore};

/// Shared handles every handler receives.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub normalizer: Arc<DocumentNormalizer>,
    pub analysis: Arc<dyn AnalysisService>,
    pub sessions: Arc<SessionStore>,
    pub limiter: Arc<RequestLimiter>,
}

impl AppState {
    pub fn new(config: Config, normalizer: DocumentNormalizer, analysis: Arc<dyn AnalysisService>) -> Self {
        let limiter = RequestLimiter::new(config.max_concurrent_requests);
        let sessions = SessionStore::new(config.max_sessions, config.session_idle_timeout());
        Self {
            config: Arc::new(config),
            normalizer: Arc::new(normalizer),
            analysis,
            sessions: Arc::new(sessions),
            limiter: Arc::new(limiter),
        }
    }

    /// Production wiring: lopdf/docx/plain-text extractors and the Gemini backend.
    pub fn from_config(config: Config) -> Result<Self> {
        let normalizer = DocumentNormalizer::new(config.extraction_timeout(), config.max_inline_bytes());
        let analysis = GeminiAnalysisService::new(config.gemini())
            .context("Failed to initialize analysis backend")?;
        Ok(Self::new(config, normalizer, Arc::new(analysis)))
    }
}
