//! Maps an upload's declared media type and file name onto an
//! [`ExtractionStrategy`].

use crate::models::ExtractionStrategy;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

// Media types clients send when they don't know any better.
const GENERIC_MIME_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/unknown",
    "application/x-unknown",
];

/// Lowercased media type with parameters (`; charset=...`) removed.
pub fn media_type_essence(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Pick the extraction strategy for an upload.
///
/// The declared media type wins; absent or generic types fall back to the
/// `.pdf` / `.docx` suffix, and everything else is read as plain text.
pub fn classify(declared_media_type: &str, file_name: &str) -> ExtractionStrategy {
    let essence = media_type_essence(declared_media_type);

    if essence.is_empty() || GENERIC_MIME_TYPES.contains(&essence.as_str()) {
        return classify_by_suffix(file_name);
    }

    match essence.as_str() {
        PDF_MIME => ExtractionStrategy::PdfPages,
        DOCX_MIME => ExtractionStrategy::WordProcessing,
        image if image.starts_with("image/") => ExtractionStrategy::OpaqueImage,
        _ => ExtractionStrategy::PlainText,
    }
}

fn classify_by_suffix(file_name: &str) -> ExtractionStrategy {
    let name = file_name.trim().to_ascii_lowercase();
    if name.ends_with(".pdf") {
        ExtractionStrategy::PdfPages
    } else if name.ends_with(".docx") {
        ExtractionStrategy::WordProcessing
    } else {
        ExtractionStrategy::PlainText
    }
}

/// Whether the model must receive the raw file next to its text.
///
/// Only the declared type counts here: a `.pdf` sent as
/// `application/octet-stream` is text-only.
pub fn is_multimodal(declared_media_type: &str) -> bool {
    let essence = media_type_essence(declared_media_type);
    essence == PDF_MIME || essence.starts_with("image/")
}
