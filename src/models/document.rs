use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Text placed in the text channel for images, whose content only travels
/// through the inline binary channel.
pub const IMAGE_SENTINEL: &str = "[Image File Uploaded]";

/// How the text channel of an upload is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    PdfPages,
    WordProcessing,
    PlainText,
    OpaqueImage,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::PdfPages => "pdf_pages",
            ExtractionStrategy::WordProcessing => "word_processing",
            ExtractionStrategy::PlainText => "plain_text",
            ExtractionStrategy::OpaqueImage => "opaque_image",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single user-submitted file.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub declared_media_type: String,
    pub raw_bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(
        name: impl Into<String>,
        declared_media_type: impl Into<String>,
        raw_bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_media_type: declared_media_type.into(),
            raw_bytes: raw_bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.raw_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_bytes.is_empty()
    }
}

/// Base64 content sent to the model next to the text channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Result of normalizing an [`UploadedDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPayload {
    pub strategy: ExtractionStrategy,
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl NormalizedPayload {
    /// True when the text channel carries something other than whitespace
    /// or the image sentinel.
    pub fn has_usable_text(&self) -> bool {
        let text = self.extracted_text.trim();
        !text.is_empty() && text != IMAGE_SENTINEL
    }

    pub fn has_usable_content(&self) -> bool {
        self.has_usable_text() || self.inline_data.is_some()
    }
}

/// What the API reports about a committed upload. Never carries the bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub media_type: String,
    pub size_bytes: usize,
    pub strategy: ExtractionStrategy,
    pub text_length: usize,
    pub has_inline_data: bool,
}

impl DocumentSummary {
    pub fn new(document: &UploadedDocument, payload: &NormalizedPayload) -> Self {
        Self {
            name: document.name.clone(),
            media_type: document.declared_media_type.clone(),
            size_bytes: document.size(),
            strategy: payload.strategy,
            text_length: payload.extracted_text.chars().count(),
            has_inline_data: payload.inline_data.is_some(),
        }
    }
}
