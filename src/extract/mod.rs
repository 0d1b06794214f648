// 🔎 Text Extractor - dispatch by file extension
// pdf → lopdf pages, docx → document.xml paragraphs, images → OCR, csv/xlsx → None

pub mod docx;
pub mod ocr;
pub mod pdf;

pub use ocr::{OcrEngine, TesseractCli};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::documents::extension;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("DOCX parsing failed: {0}")]
    Docx(String),

    #[error("Image decoding failed: {0}")]
    Image(String),

    #[error("OCR processing failed: {0}")]
    Ocr(String),
}

/// What kind of reader a file goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Image,
    Tabular,
}

impl FileFormat {
    pub fn detect(path: &Path) -> Result<Self, ExtractionError> {
        match extension(path).as_deref() {
            Some("pdf") => Ok(FileFormat::Pdf),
            Some("docx") => Ok(FileFormat::Docx),
            Some("png") | Some("jpg") | Some("jpeg") => Ok(FileFormat::Image),
            Some("csv") | Some("xlsx") => Ok(FileFormat::Tabular),
            _ => Err(ExtractionError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Extraction front door. Owns the OCR engine so tests can swap it out.
pub struct TextExtractor {
    ocr: Box<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Box<dyn OcrEngine>) -> Self {
        TextExtractor { ocr }
    }

    /// Extract plain text from a document.
    ///
    /// Returns `Ok(None)` for tabular formats (csv/xlsx), which go through the
    /// bank statement analyzer instead. Any other failure is a typed error.
    pub fn extract_text(&self, path: &Path) -> Result<Option<String>, ExtractionError> {
        let format = FileFormat::detect(path)?;

        let text = match format {
            FileFormat::Pdf => pdf::extract_pdf_text(path)?,
            FileFormat::Docx => docx::extract_docx_text(path)?,
            FileFormat::Image => {
                info!(path = %path.display(), "Extracting text from image via OCR");
                let png = ocr::prepare_image(path)?;
                self.ocr.recognize(&png)?.join("\n")
            }
            FileFormat::Tabular => {
                debug!(path = %path.display(), "Skipping text extraction for tabular file");
                return Ok(None);
            }
        };

        let text = sanitize(&text);
        debug!(path = %path.display(), chars = text.len(), "Extracted text");
        Ok(Some(text))
    }
}

/// Drop replacement characters and NULs left over from lossy decoding
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\u{FFFD}' && *c != '\0')
        .collect()
}
