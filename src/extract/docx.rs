use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::ExtractionError;

/// Main body part inside the OOXML package
const DOCUMENT_PART: &str = "word/document.xml";

/// Empty `<w:p .../>` first so it never swallows the next paragraph
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p\b[^>]*/>|<w:p\b[^>]*>.*?</w:p>").unwrap());

static RUN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t(?: [^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br/>").unwrap());

/// Full document text, one line per paragraph
pub fn extract_docx_text(path: &Path) -> Result<String, ExtractionError> {
    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::Docx(format!("{}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)?;

    Ok(document_xml_to_text(&xml))
}

/// Flatten WordprocessingML paragraphs into plain text
pub fn document_xml_to_text(xml: &str) -> String {
    PARAGRAPH
        .find_iter(xml)
        .map(|paragraph| {
            RUN_TEXT
                .captures_iter(paragraph.as_str())
                .map(|cap| match cap.get(1) {
                    Some(text) => unescape(text.as_str()),
                    None if cap[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
