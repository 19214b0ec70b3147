use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;
use super::document::{DocumentSummary, ExtractionStrategy, InlineData, NormalizedPayload, UploadedDocument};

#[derive(Debug, Serialize, Deserialize)]
pub struct NormalizeResponse {
    pub success: bool,
    pub data: NormalizeData,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NormalizeData {
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: usize,
    pub strategy: ExtractionStrategy,
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub data: SessionData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: Uuid,
    pub phase: String,
    pub document: Option<DocumentSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub data: AnalysisResult,
    pub processing_time_ms: u64,
}

impl NormalizeResponse {
    pub fn new(document: &UploadedDocument, payload: NormalizedPayload, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data: NormalizeData {
                file_name: document.name.clone(),
                media_type: document.declared_media_type.clone(),
                size_bytes: document.size(),
                strategy: payload.strategy,
                extracted_text: payload.extracted_text,
                inline_data: payload.inline_data,
            },
            processing_time_ms,
        }
    }
}

impl SessionResponse {
    pub fn new(session_id: Uuid, phase: impl Into<String>, document: Option<DocumentSummary>) -> Self {
        Self {
            success: true,
            data: SessionData {
                session_id,
                phase: phase.into(),
                document,
            },
        }
    }
}

impl AnalyzeResponse {
    pub fn new(data: AnalysisResult, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data,
            processing_time_ms,
        }
    }
}
