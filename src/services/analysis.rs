//! Analysis backend boundary.
//!
//! The pipeline only sees [`AnalysisService`]; [`GeminiAnalysisService`] is
//! the production implementation talking to the Gemini `generateContent` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{AnalysisRequest, AnalysisResult};

const MAX_RETRIES: u32 = 3;
const SEED: i64 = 42;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analysis backend is not configured: {0}")]
    NotConfigured(String),

    #[error("request to analysis backend failed: {0}")]
    Transport(String),

    #[error("analysis backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("analysis backend returned no content")]
    EmptyResponse,

    #[error("analysis response could not be parsed: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

pub struct GeminiAnalysisService {
    client: Client,
    config: GeminiConfig,
}

impl GeminiAnalysisService {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send with retry on 429, 5xx and transport errors, doubling the delay
    /// each time.
    async fn send_request(
        &self,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AnalysisError> {
        let mut retry_delay = Duration::from_secs(2);
        let mut last_error = AnalysisError::Transport("no attempt made".to_string());

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", api_key)
                .json(body)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {
                    return r
                        .json()
                        .await
                        .map_err(|e| AnalysisError::InvalidResponse(e.to_string()));
                }
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS || r.status().is_server_error() => {
                    let status = r.status();
                    warn!(status = %status, attempt = attempt + 1, max_retries = MAX_RETRIES, "Analysis backend busy, retrying");
                    last_error = AnalysisError::Api {
                        status: status.as_u16(),
                        body: r.text().await.unwrap_or_default(),
                    };
                }
                Ok(r) => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(AnalysisError::Api { status, body });
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Analysis request failed");
                    last_error = AnalysisError::Transport(e.to_string());
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl AnalysisService for GeminiAnalysisService {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        info!(
            model = %self.config.model,
            text_length = request.resume_text.len(),
            inline = request.inline_data.is_some(),
            "Requesting analysis"
        );

        let body = build_request_body(&request);
        let response = self.send_request(api_key, &body).await?;
        let text = response.text().ok_or(AnalysisError::EmptyResponse)?;
        debug!(characters = text.len(), "Analysis response received");

        parse_analysis(&text)
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    serde_json::from_str(text).map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    seed: i64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ── Request construction ─────────────────────────────────────────────────────

const INSTRUCTIONS: &str = "You are a senior recruiter and ATS resume writer. \
Read the candidate's resume or LinkedIn profile and the target job description. \
Score how well the candidate matches the job, list matched and missing ATS keywords, \
review each resume section, point out formatting, grammar and duplicated content, \
rewrite three to five weak bullet points with the STAR method, and rewrite the \
professional summary for the target role. Then write a complete single-column \
Markdown resume positioned for the target job, in active voice with quantified \
achievements and no placeholders, and a three to four paragraph cover letter \
using [Your Name], [Date], [Company Name] and [Hiring Manager] placeholders.";

const DEFAULT_JOB_CONTEXT: &str = "No job description provided. Produce a general \
ATS-optimized resume suited to the candidate's experience level and industry.";

pub fn build_request_body(request: &AnalysisRequest) -> GenerateContentRequest {
    let source_note = if request.inline_data.is_some() {
        "The profile is attached as a file (PDF or image). Read all of its text and structure."
    } else {
        "The profile is provided as text."
    };

    let job_description = if request.job_description.trim().is_empty() {
        DEFAULT_JOB_CONTEXT
    } else {
        request.job_description.trim()
    };

    let mut parts = vec![Part::Text {
        text: format!(
            "{}\n\n{}\n\nTARGET JOB DESCRIPTION:\n{}\n\nTailor every section to this job, \
             whatever the candidate's current title.",
            INSTRUCTIONS, source_note, job_description
        ),
    }];

    match &request.inline_data {
        Some(inline) => {
            parts.push(Part::InlineData {
                inline_data: Blob {
                    mime_type: inline.mime_type.clone(),
                    data: inline.data.clone(),
                },
            });
            parts.push(Part::Text {
                text: "This is the candidate's profile. Extract everything and build the resume from it."
                    .to_string(),
            });
        }
        None => parts.push(Part::Text {
            text: format!("CANDIDATE PROFILE:\n{}", request.resume_text),
        }),
    }

    GenerateContentRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
            temperature: 0.0,
            seed: SEED,
        },
    }
}

fn string_list() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

fn skill_list() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "skill": { "type": "STRING" },
                "found": { "type": "BOOLEAN" },
                "importance": { "type": "STRING", "enum": ["High", "Medium", "Low"] }
            },
            "required": ["skill", "found", "importance"]
        }
    })
}

/// Structured output schema matching [`AnalysisResult`].
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "overallScore": { "type": "NUMBER" },
            "summary": { "type": "STRING" },
            "scores": {
                "type": "OBJECT",
                "properties": {
                    "impact": { "type": "NUMBER" },
                    "brevity": { "type": "NUMBER" },
                    "style": { "type": "NUMBER" },
                    "keywords": { "type": "NUMBER" }
                },
                "required": ["impact", "brevity", "style", "keywords"]
            },
            "atsKeywords": {
                "type": "OBJECT",
                "properties": { "matched": string_list(), "missing": string_list() },
                "required": ["matched", "missing"]
            },
            "sectionAnalysis": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "status": { "type": "STRING", "enum": ["Good", "Needs Improvement", "Missing"] },
                        "feedback": { "type": "STRING" }
                    },
                    "required": ["name", "status", "feedback"]
                }
            },
            "formattingIssues": string_list(),
            "grammarIssues": string_list(),
            "duplicateContent": string_list(),
            "starRewrites": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "original": { "type": "STRING" },
                        "improved": { "type": "STRING" },
                        "reason": { "type": "STRING" }
                    },
                    "required": ["original", "improved", "reason"]
                }
            },
            "professionalSummaryRewrite": { "type": "STRING" },
            "coverLetter": { "type": "STRING" },
            "hardSkills": skill_list(),
            "softSkills": skill_list(),
            "optimizedResumeMarkdown": { "type": "STRING" }
        },
        "required": [
            "overallScore", "summary", "scores", "atsKeywords", "sectionAnalysis",
            "formattingIssues", "grammarIssues", "duplicateContent", "starRewrites",
            "professionalSummaryRewrite", "coverLetter", "hardSkills", "softSkills",
            "optimizedResumeMarkdown"
        ]
    })
}
