use serde::{Deserialize, Serialize};

use super::analysis::AnalysisRequest;
use super::document::NormalizedPayload;
use crate::services::NormalizeError;

/// Body of `POST /api/v1/sessions/:id/analyze`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub job_description: Option<String>,
    /// Pasted resume text; takes precedence over the uploaded document.
    #[serde(default)]
    pub resume_text: Option<String>,
}

impl AnalyzeRequest {
    pub fn pasted_text(&self) -> Option<&str> {
        self.resume_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn job_description(&self) -> &str {
        self.job_description.as_deref().unwrap_or("").trim()
    }

    /// Build the backend request from this body and the session's committed
    /// payload, if any. Pasted text wins and is sent text-only.
    pub fn to_analysis_request(
        &self,
        payload: Option<&NormalizedPayload>,
    ) -> Result<AnalysisRequest, NormalizeError> {
        let job_description = self.job_description().to_string();

        if let Some(text) = self.pasted_text() {
            return Ok(AnalysisRequest {
                resume_text: text.to_string(),
                job_description,
                inline_data: None,
            });
        }

        match payload {
            Some(payload) if payload.has_usable_content() => Ok(AnalysisRequest {
                resume_text: payload.extracted_text.clone(),
                job_description,
                inline_data: payload.inline_data.clone(),
            }),
            _ => Err(NormalizeError::NoUsableContent),
        }
    }
}
