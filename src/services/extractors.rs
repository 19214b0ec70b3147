use std::io::{Cursor, Read};

use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("document archive is unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("document XML is malformed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Produces the text of every page of a paginated document, page 1 first.
pub trait PageTextExtractor: Send + Sync {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Produces the flat text of a document.
pub trait RawTextExtractor: Send + Sync {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// PDF pages via lopdf, with pdf-extract as a second opinion when lopdf
/// cannot decode any text at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfPageExtractor;

impl LopdfPageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageTextExtractor for LopdfPageExtractor {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        let document = Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

        // get_pages() is a BTreeMap keyed by page number, so this is reading order.
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        debug!("PDF has {} pages", page_numbers.len());

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let text = match document.extract_text(&[number]) {
                Ok(text) => join_runs(&text),
                Err(e) => {
                    warn!(page = number, error = %e, "Could not decode page text, leaving it blank");
                    String::new()
                }
            };
            pages.push(text);
        }

        if pages.iter().all(|page| page.is_empty()) {
            debug!("lopdf found no text, retrying with pdf-extract");
            if let Some(fallback) = extract_with_pdf_extract(bytes) {
                let fallback: Vec<String> = fallback.iter().map(|page| join_runs(page)).collect();
                if fallback.iter().any(|page| !page.is_empty()) {
                    return Ok(fallback);
                }
            }
        }

        Ok(pages)
    }
}

/// One text run per line in, single-space separated runs out.
fn join_runs(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|run| !run.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Page texts from pdf-extract, which also follows text drawn through form
/// XObjects.
fn extract_with_pdf_extract(bytes: &[u8]) -> Option<Vec<String>> {
    // pdf-extract panics on some malformed fonts.
    let owned = bytes.to_vec();
    match std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem_by_pages(&owned)) {
        Ok(Ok(pages)) => Some(pages),
        Ok(Err(e)) => {
            warn!(error = %e, "pdf-extract fallback failed");
            None
        }
        Err(_) => {
            warn!("pdf-extract panicked during fallback extraction");
            None
        }
    }
}

/// Raw text of an OOXML word-processing document (`.docx`).
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxTextExtractor;

impl DocxTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl RawTextExtractor for DocxTextExtractor {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut xml = String::new();
        archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
        parse_document_xml(&xml)
    }
}

/// Paragraph text from `word/document.xml`, each paragraph followed by a
/// blank line. Styling is dropped.
fn parse_document_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:r" => in_run = true,
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:r" => in_run = false,
                b"w:t" => in_text = false,
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            // Tab stops in paragraph properties are also `w:tab`; only runs count.
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" if in_run => text.push('\t'),
                b"w:br" | b"w:cr" if in_run => text.push('\n'),
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(e) if in_text => text.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Bytes read as UTF-8 text, the way a browser's `File.text()` does: a
/// leading byte order mark is dropped and invalid sequences become U+FFFD.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl RawTextExtractor for PlainTextExtractor {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_become_blank_line_separated_text() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
      <w:r><w:rPr><w:b/></w:rPr><w:t>Jane</w:t></w:r><w:r><w:t xml:space="preserve"> Doe</w:t></w:r>
    </w:p>
    <w:p><w:r><w:t>Rust</w:t><w:tab/><w:t>Go &amp; C</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let text = DocxTextExtractor::new().raw_text(&docx_with(xml)).unwrap();
        assert_eq!(text, "Jane Doe\n\nRust\tGo & C\n\n");
    }

    #[test]
    fn docx_with_mismatched_tags_is_an_error() {
        let xml = "<w:document><w:body><w:p><w:r><w:t>Hi</w:r></w:p></w:body></w:document>";
        let err = DocxTextExtractor::new().raw_text(&docx_with(xml)).unwrap_err();
        assert!(matches!(err, ExtractError::Xml(_)));
    }

    #[test]
    fn docx_without_document_part_is_an_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("docProps/core.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<cp:coreProperties/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = DocxTextExtractor::new().raw_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[test]
    fn non_zip_bytes_are_not_a_docx() {
        assert!(DocxTextExtractor::new().raw_text(b"plainly not a zip").is_err());
    }

    #[test]
    fn plain_text_drops_bom_and_replaces_invalid_utf8() {
        let text = PlainTextExtractor::new()
            .raw_text(b"\xEF\xBB\xBFcaf\xC3\xA9 \xFF")
            .unwrap();
        assert_eq!(text, "caf\u{e9} \u{fffd}");
    }

    #[test]
    fn garbage_is_not_a_pdf() {
        let err = LopdfPageExtractor::new().pages(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn runs_are_joined_with_single_spaces() {
        assert_eq!(join_runs("Alice\n  Smith \n\n"), "Alice Smith");
        assert_eq!(join_runs("\n \n"), "");
    }
}
