use lopdf::Document;
use std::path::Path;

use super::ExtractionError;

/// Concatenate the text of every page, page order preserved
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    Ok(extract_pdf_pages(path)?.join("\n"))
}

/// Text of each page, in page order
pub fn extract_pdf_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let document = Document::load(path).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    // get_pages is a BTreeMap keyed by page number, so iteration is in order
    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        let text = document
            .extract_text(&[*page_number])
            .map_err(|e| ExtractionError::Pdf(format!("page {}: {}", page_number, e)))?;
        pages.push(text);
    }

    Ok(pages)
}
