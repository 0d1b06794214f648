use image::ImageFormat;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use super::ExtractionError;

/// OCR engine abstraction (allows mocking for tests).
///
/// Takes a PNG and returns recognized lines top-to-bottom.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, png_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Decode an image file and re-encode it as grayscale PNG for the engine
pub fn prepare_image(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    let decoded = image::open(path).map_err(|e| ExtractionError::Image(e.to_string()))?;
    debug!(
        path = %path.display(),
        width = decoded.width(),
        height = decoded.height(),
        "Decoded image"
    );

    let gray = image::DynamicImage::ImageLuma8(decoded.to_luma8());
    let mut png = Cursor::new(Vec::new());
    gray.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ExtractionError::Image(e.to_string()))?;

    Ok(png.into_inner())
}

/// Tesseract driven as an external process: `tesseract stdin stdout -l <lang>`
pub struct TesseractCli {
    program: String,
    language: String,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        TesseractCli {
            program: program.into(),
            language: language.into(),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, png_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractionError::Ocr(format!("failed to start {}: {}", self.program, e)))?;

        // stdin is dropped (closed) before the wait; the child is reaped either way
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png_bytes),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ExtractionError::Ocr(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written?;

        Ok(recognized_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Non-empty trimmed lines, engine order preserved
pub fn recognized_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_lines_skip_blanks() {
        let raw = "PERMANENT ACCOUNT NUMBER\n\n  ASHA RAO  \n\x0c";
        // tesseract ends its output with a form feed
        assert_eq!(recognized_lines(raw), vec!["PERMANENT ACCOUNT NUMBER", "ASHA RAO"]);
    }

    #[test]
    fn test_prepare_image_outputs_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.jpg");
        image::RgbImage::from_pixel(4, 4, image::Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();

        let png = prepare_image(&path).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 4);
        assert!(matches!(decoded, image::DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_missing_program_is_ocr_error() {
        let engine = TesseractCli::new("definitely-not-a-real-ocr-binary", "eng");
        let result = engine.recognize(b"png");
        assert!(matches!(result, Err(ExtractionError::Ocr(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_exiting_before_reading_input() {
        // `false` never reads stdin, so a large write hits a closed pipe
        let engine = TesseractCli::new("false", "eng");
        let payload = vec![0u8; 4 * 1024 * 1024];

        match engine.recognize(&payload) {
            Err(ExtractionError::Ocr(message)) => assert!(message.starts_with("false exited with")),
            other => panic!("expected OCR exit error, got {:?}", other),
        }
    }
}
