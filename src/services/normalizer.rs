use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{ExtractionStrategy, InlineData, NormalizedPayload, UploadedDocument, IMAGE_SENTINEL};
use crate::services::classifier::{classify, is_multimodal, media_type_essence};
use crate::services::extractors::{
    DocxTextExtractor, ExtractError, LopdfPageExtractor, PageTextExtractor, PlainTextExtractor,
    RawTextExtractor,
};

const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("could not extract text ({strategy}): {message}")]
    Extraction {
        strategy: ExtractionStrategy,
        message: String,
    },

    #[error("could not encode file for inline transport: {message}")]
    Encoding { message: String },

    #[error("file contains no usable content")]
    NoUsableContent,
}

/// Turns an [`UploadedDocument`] into a [`NormalizedPayload`].
///
/// Stateless: one instance serves every request. Extractors are injected so
/// the ordering and failure policy can be exercised without real parsers.
#[derive(Clone)]
pub struct DocumentNormalizer {
    pdf: Arc<dyn PageTextExtractor>,
    word: Arc<dyn RawTextExtractor>,
    plain: Arc<dyn RawTextExtractor>,
    extraction_timeout: Duration,
    max_inline_bytes: usize,
}

impl DocumentNormalizer {
    pub fn new(extraction_timeout: Duration, max_inline_bytes: usize) -> Self {
        Self {
            pdf: Arc::new(LopdfPageExtractor::new()),
            word: Arc::new(DocxTextExtractor::new()),
            plain: Arc::new(PlainTextExtractor::new()),
            extraction_timeout,
            max_inline_bytes,
        }
    }

    pub fn with_pdf_extractor(mut self, extractor: Arc<dyn PageTextExtractor>) -> Self {
        self.pdf = extractor;
        self
    }

    pub fn with_word_extractor(mut self, extractor: Arc<dyn RawTextExtractor>) -> Self {
        self.word = extractor;
        self
    }

    pub fn with_plain_text_extractor(mut self, extractor: Arc<dyn RawTextExtractor>) -> Self {
        self.plain = extractor;
        self
    }

    pub async fn normalize(&self, document: &UploadedDocument) -> Result<NormalizedPayload, NormalizeError> {
        let start = Instant::now();
        let strategy = classify(&document.declared_media_type, &document.name);

        info!(
            file_name = %document.name,
            media_type = %document.declared_media_type,
            size_bytes = document.size(),
            strategy = %strategy,
            "Normalizing document"
        );

        let extracted_text = match strategy {
            ExtractionStrategy::OpaqueImage => IMAGE_SENTINEL.to_string(),
            ExtractionStrategy::PdfPages => match self.extract(strategy, document.raw_bytes.clone()).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        file_name = %document.name,
                        error = %e,
                        "PDF text extraction failed, continuing without a text layer"
                    );
                    String::new()
                }
            },
            ExtractionStrategy::WordProcessing | ExtractionStrategy::PlainText => {
                self.extract(strategy, document.raw_bytes.clone()).await?
            }
        };

        let inline_data = if is_multimodal(&document.declared_media_type) {
            Some(self.encode_inline(document)?)
        } else {
            None
        };

        let payload = NormalizedPayload {
            strategy,
            extracted_text,
            inline_data,
        };

        info!(
            file_name = %document.name,
            text_length = payload.extracted_text.len(),
            inline = payload.inline_data.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document normalized"
        );

        Ok(payload)
    }

    /// Run a text strategy on the blocking pool, bounded by the extraction
    /// timeout. Errors, parser panics and timeouts all come back as
    /// [`NormalizeError::Extraction`].
    async fn extract(&self, strategy: ExtractionStrategy, bytes: Bytes) -> Result<String, NormalizeError> {
        let pdf = Arc::clone(&self.pdf);
        let word = Arc::clone(&self.word);
        let plain = Arc::clone(&self.plain);

        let task = tokio::task::spawn_blocking(move || -> Result<String, ExtractError> {
            match strategy {
                ExtractionStrategy::PdfPages => pdf.pages(&bytes).map(|pages| join_pages(&pages)),
                ExtractionStrategy::WordProcessing => word.raw_text(&bytes),
                ExtractionStrategy::PlainText => plain.raw_text(&bytes),
                ExtractionStrategy::OpaqueImage => {
                    Err(ExtractError::Other("images have no text channel".to_string()))
                }
            }
        });

        let failure = |message: String| NormalizeError::Extraction { strategy, message };

        match tokio::time::timeout(self.extraction_timeout, task).await {
            Ok(Ok(Ok(text))) => {
                debug!(strategy = %strategy, characters = text.len(), "Extraction finished");
                Ok(text)
            }
            Ok(Ok(Err(e))) => Err(failure(e.to_string())),
            Ok(Err(join_error)) => Err(failure(format!("extractor aborted: {}", join_error))),
            Err(_) => Err(failure(format!(
                "timed out after {}s",
                self.extraction_timeout.as_secs_f32()
            ))),
        }
    }

    fn encode_inline(&self, document: &UploadedDocument) -> Result<InlineData, NormalizeError> {
        if document.is_empty() {
            return Err(NormalizeError::Encoding {
                message: "file is empty".to_string(),
            });
        }
        if document.size() > self.max_inline_bytes {
            return Err(NormalizeError::Encoding {
                message: format!(
                    "{} bytes exceeds the inline limit of {} bytes",
                    document.size(),
                    self.max_inline_bytes
                ),
            });
        }

        Ok(InlineData {
            mime_type: media_type_essence(&document.declared_media_type),
            data: base64::engine::general_purpose::STANDARD.encode(&document.raw_bytes),
        })
    }
}

/// Pages in order, each followed by a blank line.
pub fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page);
        text.push_str(PAGE_SEPARATOR);
    }
    text
}

/// Gate applied by callers before a payload is committed or sent for
/// analysis: at least one of the two channels must carry something.
pub fn require_usable(payload: NormalizedPayload) -> Result<NormalizedPayload, NormalizeError> {
    if payload.has_usable_content() {
        Ok(payload)
    } else {
        warn!(strategy = %payload.strategy, "Payload has neither usable text nor inline data");
        Err(NormalizeError::NoUsableContent)
    }
}
