// 🧭 Wizard Controller - step handlers over an explicit Session
// Start → Upload → Verify → Summarize → Profile. Each handler is synchronous and
// consults the session memo before touching the extractor or the model.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::bank::{self, BankAnalysis, BankStatementError, BankTransaction, Window};
use crate::config::Config;
use crate::documents::{
    content_hash, BackendFolder, BackendInventory, Document, DocumentKind, Staging, UploadError,
};
use crate::extract::{self, FileFormat, TesseractCli, TextExtractor};
use crate::llm::{profile_json, Assistant, ModelBackend, OllamaCli, VerificationResult};
use crate::session::{
    profile_key, ArtifactKey, CustomerProfile, DocumentText, Memo, QueryAnswer, Session,
};

const IDENTITY_DERIVATION: &str = "identity-summary";
const SUMMARY_DERIVATION: &str = "summary";

const PDF_PREVIEW_CHARS: usize = 1000;
const DOCX_PREVIEW_CHARS: usize = 500;
const PREVIEW_ROWS: usize = 7;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0} not uploaded!")]
    MissingDocument(DocumentKind),

    #[error("No document summaries found. Please restart the process.")]
    NoSummaries,

    #[error("Please enter a question to get an answer.")]
    EmptyQuestion,

    #[error("No customer profile yet. Generate the profile first.")]
    NoProfile,

    #[error("Could not read {kind}: {reason}")]
    Extraction { kind: DocumentKind, reason: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Bank statement analysis failed: {0}")]
    Bank(#[from] BankStatementError),
}

/// What the verify step shows
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub identity_summary: String,
    pub results: Vec<VerificationResult>,
    pub customer_photo: Option<PathBuf>,
}

impl VerificationReport {
    pub fn mismatches(&self) -> Vec<DocumentKind> {
        self.results
            .iter()
            .filter(|r| !r.matched)
            .map(|r| r.kind)
            .collect()
    }

    pub fn all_matched(&self) -> bool {
        self.results.iter().all(|r| r.matched)
    }
}

/// What the summarize step shows
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryReport {
    pub summaries: BTreeMap<DocumentKind, String>,
    pub bank: Option<BankAnalysis>,
    /// Inline problems that did not stop the other documents
    pub warnings: Vec<String>,
}

/// Upload-step look at a staged file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Preview {
    Image { width: u32, height: u32 },
    /// First PDF page or leading DOCX text, truncated
    Text { text: String },
    /// Leading statement rows
    Rows { rows: Vec<BankTransaction> },
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ============================================================================
// WIZARD
// ============================================================================

pub struct Wizard<M: ModelBackend> {
    staging: Staging,
    backend_folder: BackendFolder,
    extractor: TextExtractor,
    assistant: Assistant<M>,
}

impl Wizard<OllamaCli> {
    /// Production wiring: tesseract for images, `ollama run` for the model
    pub fn from_config(config: &Config) -> Self {
        Wizard::new(
            Staging::new(&config.staging_dir),
            BackendFolder::new(&config.backend_dir),
            TextExtractor::new(Box::new(TesseractCli::new(
                config.ocr.program.clone(),
                config.ocr.language.clone(),
            ))),
            Assistant::new(OllamaCli::from_config(&config.model)),
        )
    }
}

impl<M: ModelBackend> Wizard<M> {
    pub fn new(
        staging: Staging,
        backend_folder: BackendFolder,
        extractor: TextExtractor,
        assistant: Assistant<M>,
    ) -> Self {
        Wizard {
            staging,
            backend_folder,
            extractor,
            assistant,
        }
    }

    pub fn backend_folder(&self) -> &BackendFolder {
        &self.backend_folder
    }

    // ------------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------------

    /// Validate, stage and record a file for one slot
    pub fn upload(
        &self,
        session: &mut Session,
        kind: DocumentKind,
        source: &Path,
    ) -> Result<Document, StepError> {
        let document = self.staging.stage_file(kind, source)?;
        session.record_upload(document.clone());
        Ok(document)
    }

    /// Preview of a staged slot. Reads the file without touching the session memo.
    pub fn preview(&self, session: &Session, kind: DocumentKind) -> Result<Preview, StepError> {
        let document = session.upload(kind).ok_or(StepError::MissingDocument(kind))?;
        let path = document.path.as_path();
        let unreadable = |reason: String| StepError::Extraction { kind, reason };

        let format = FileFormat::detect(path).map_err(|e| unreadable(e.to_string()))?;
        let preview = match format {
            FileFormat::Image => {
                let (width, height) =
                    image::image_dimensions(path).map_err(|e| unreadable(e.to_string()))?;
                Preview::Image { width, height }
            }
            FileFormat::Pdf => {
                let pages = extract::pdf::extract_pdf_pages(path).map_err(|e| unreadable(e.to_string()))?;
                let first = pages.first().map(String::as_str).unwrap_or_default();
                Preview::Text {
                    text: truncate_chars(&extract::sanitize(first), PDF_PREVIEW_CHARS),
                }
            }
            FileFormat::Docx => {
                let text = extract::docx::extract_docx_text(path).map_err(|e| unreadable(e.to_string()))?;
                Preview::Text {
                    text: truncate_chars(&extract::sanitize(&text), DOCX_PREVIEW_CHARS),
                }
            }
            FileFormat::Tabular => {
                let mut rows = bank::load_statement(path)?;
                rows.truncate(PREVIEW_ROWS);
                Preview::Rows { rows }
            }
        };
        Ok(preview)
    }

    /// Stage every expected-named reference document present in the backend folder
    pub fn use_backend_documents(&self, session: &mut Session) -> Result<BackendInventory, StepError> {
        let inventory = self.backend_folder.verify_documents();
        for (kind, path) in &inventory.available {
            if let Some(path) = path {
                self.upload(session, *kind, path)?;
            }
        }

        if !inventory.all_docs_uploaded {
            warn!(missing = ?inventory.missing_files, "Backend folder is incomplete");
        }
        Ok(inventory)
    }

    // ------------------------------------------------------------------------
    // Extraction (memoized per content hash)
    // ------------------------------------------------------------------------

    fn document_text(&self, session: &mut Session, document: &Document) -> DocumentText {
        if let Some(text) = session.texts.get(&document.content_hash) {
            return text.clone();
        }

        let text = match self.extractor.extract_text(&document.path) {
            Ok(Some(text)) => DocumentText::Text(text),
            Ok(None) => DocumentText::Tabular,
            Err(e) => {
                warn!(kind = %document.kind, path = %document.path.display(), error = %e, "Text extraction failed");
                DocumentText::Failed(e.to_string())
            }
        };

        session
            .texts
            .insert(document.content_hash.clone(), text.clone());
        text
    }

    /// Extracted text of an uploaded slot, or why there is none
    fn text_of(&self, session: &mut Session, document: &Document) -> Result<String, StepError> {
        match self.document_text(session, document) {
            DocumentText::Text(text) => Ok(text),
            DocumentText::Tabular => Err(StepError::Extraction {
                kind: document.kind,
                reason: "tabular file has no free text".to_string(),
            }),
            DocumentText::Failed(reason) => Err(StepError::Extraction {
                kind: document.kind,
                reason,
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Verify
    // ------------------------------------------------------------------------

    /// Summarized identity details of the uploaded ID document
    pub fn extract_identity(&self, session: &mut Session) -> Result<String, StepError> {
        let document = session
            .upload(DocumentKind::Identity)
            .cloned()
            .ok_or(StepError::MissingDocument(DocumentKind::Identity))?;

        let key = ArtifactKey::new(document.content_hash.clone(), IDENTITY_DERIVATION);
        if let Some(summary) = session.identity_summary.as_ref().and_then(|m| m.get(&key)) {
            return Ok(summary.clone());
        }

        let text = self.text_of(session, &document)?;
        let summary = self
            .assistant
            .summarize(DocumentKind::Identity, &text)
            .map(|s| s.text)
            .unwrap_or_default();
        info!(session = %session.id(), "Extracted identity details");

        session.identity_summary = Some(Memo::new(key, summary.clone()));
        Ok(summary)
    }

    /// Identity summary plus a name cross-check of every uploaded verifiable document
    pub fn verify(&self, session: &mut Session) -> Result<VerificationReport, StepError> {
        let identity_summary = self.extract_identity(session)?;
        let identity_hash = content_hash(identity_summary.as_bytes());

        let mut results = Vec::new();
        for kind in DocumentKind::ALL.into_iter().filter(|k| k.is_verifiable()) {
            let Some(document) = session.upload(kind).cloned() else {
                continue;
            };

            let key = ArtifactKey::new(document.content_hash.clone(), identity_hash.clone());
            if let Some(result) = session.verifications.get(&kind).and_then(|m| m.get(&key)) {
                results.push(result.clone());
                continue;
            }

            let result = match self.text_of(session, &document) {
                Ok(text) => self.assistant.verify_name(&identity_summary, &text, kind),
                Err(e) => VerificationResult {
                    kind,
                    matched: false,
                    response: e.to_string(),
                },
            };

            session
                .verifications
                .insert(kind, Memo::new(key, result.clone()));
            results.push(result);
        }

        let report = VerificationReport {
            identity_summary,
            results,
            customer_photo: self.backend_folder.customer_photo(),
        };

        if !report.all_matched() {
            warn!(mismatches = ?report.mismatches(), "Name mismatch found");
        }
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Summarize
    // ------------------------------------------------------------------------

    /// Bank statement analysis for a window, memoized per (content hash, window)
    pub fn bank_analysis(&self, session: &mut Session, window: Window) -> Result<BankAnalysis, StepError> {
        let document = session
            .upload(DocumentKind::BankStatement)
            .cloned()
            .ok_or(StepError::MissingDocument(DocumentKind::BankStatement))?;

        if let Some(analysis) = session.bank_analysis(window) {
            return Ok(analysis.clone());
        }

        let analysis = bank::analyze(&document.path, window)?;
        session
            .bank_analyses
            .insert((document.content_hash.clone(), window), analysis.clone());
        Ok(analysis)
    }

    /// Summaries of the sale deed and credit report plus the bank analysis for `window`
    pub fn summarize(&self, session: &mut Session, window: Window) -> SummaryReport {
        let mut report = SummaryReport::default();

        for kind in [DocumentKind::SaleDeed, DocumentKind::CreditReport] {
            let Some(document) = session.upload(kind).cloned() else {
                continue;
            };

            let key = ArtifactKey::new(document.content_hash.clone(), SUMMARY_DERIVATION);
            if let Some(summary) = session.summaries.get(&kind).and_then(|m| m.get(&key)) {
                report.summaries.insert(kind, summary.clone());
                continue;
            }

            match self.text_of(session, &document) {
                Ok(text) => {
                    if let Some(summary) = self.assistant.summarize(kind, &text) {
                        session.summaries.insert(kind, Memo::new(key, summary.text.clone()));
                        report.summaries.insert(kind, summary.text);
                    }
                }
                Err(e) => report.warnings.push(e.to_string()),
            }
        }

        if session.upload(DocumentKind::BankStatement).is_some() {
            match self.bank_analysis(session, window) {
                Ok(analysis) => {
                    let text = analysis.summary_text();
                    if let Some(document) = session.upload(DocumentKind::BankStatement) {
                        let key = ArtifactKey::new(document.content_hash.clone(), window.label());
                        session
                            .summaries
                            .insert(DocumentKind::BankStatement, Memo::new(key, text.clone()));
                    }
                    report.summaries.insert(DocumentKind::BankStatement, text);
                    report.bank = Some(analysis);
                }
                Err(e) => {
                    warn!(error = %e, "Bank statement analysis failed");
                    report.warnings.push(e.to_string());
                }
            }
        }

        info!(
            session = %session.id(),
            window = %window,
            summaries = report.summaries.len(),
            warnings = report.warnings.len(),
            "Summarized documents"
        );
        report
    }

    // ------------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------------

    /// Final RM narrative, memoized on the exact set of summaries it was built from
    pub fn build_profile(&self, session: &mut Session, today: NaiveDate) -> Result<CustomerProfile, StepError> {
        let summaries = session.current_summaries();
        if summaries.is_empty() {
            return Err(StepError::NoSummaries);
        }

        let key = profile_key(&summaries);
        if let Some(profile) = session.profile.as_ref().and_then(|m| m.get(&key)) {
            return Ok(profile.clone());
        }

        let narrative = self.assistant.generate_profile(&summaries, today);
        let profile = CustomerProfile {
            summaries,
            narrative,
        };
        info!(session = %session.id(), documents = profile.summaries.len(), "Generated customer profile");

        session.profile = Some(Memo::new(key, profile.clone()));
        session.last_answer = None;
        Ok(profile)
    }

    /// Free-text question over the profile's summaries. Never memoized.
    pub fn answer(&self, session: &mut Session, question: &str) -> Result<String, StepError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(StepError::EmptyQuestion);
        }
        let profile = session.profile().ok_or(StepError::NoProfile)?;

        let answer = self.assistant.answer(&profile_json(&profile.summaries), question);
        session.last_answer = Some(QueryAnswer {
            question: question.to_string(),
            answer: answer.clone(),
        });
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionError, OcrEngine};
    use crate::llm::{ModelInvocationError, FALLBACK_RESPONSE};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers YES to name checks and echoes a short tag otherwise
    struct CountingModel {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ModelBackend for CountingModel {
        fn run(&self, prompt: &str) -> Result<String, ModelInvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ModelInvocationError::Timeout(std::time::Duration::from_secs(1)));
            }
            if prompt.contains("Return **YES or NO**") {
                Ok("YES, the names match.".to_string())
            } else {
                Ok(format!("summary #{}", self.calls.load(Ordering::SeqCst)))
            }
        }
    }

    struct StaticOcr;

    impl OcrEngine for StaticOcr {
        fn recognize(&self, _png: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(vec!["Name: Asha Rao".to_string()])
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        wizard: Wizard<CountingModel>,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(fail: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let wizard = Wizard::new(
            Staging::new(dir.path().join("temp")),
            BackendFolder::new(dir.path().join("backend_documents")),
            TextExtractor::new(Box::new(StaticOcr)),
            Assistant::new(CountingModel {
                calls: calls.clone(),
                fail,
            }),
        );
        Fixture { dir, wizard, calls }
    }

    fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn write_id_image(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("id.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        path
    }

    const STATEMENT: &str = "CR_DR_INDICATOR,TXN_AMOUNT_LCY,TXN_DATE_TIME,TXN_DESC\n\
                             C,5000,2024-01-01 09:00:00,SALARY JAN\n\
                             D,1200,2024-01-03 18:30:00,GROCERY\n\
                             D,200,2024-01-10 11:00:00,STOCK PURCHASE\n";

    #[test]
    fn test_preview_per_format() {
        let f = fixture(false);
        let mut session = Session::new();

        let mut body = String::from("CR_DR_INDICATOR,TXN_AMOUNT_LCY,TXN_DATE_TIME,TXN_DESC\n");
        for day in 1..=10 {
            body.push_str(&format!("D,{},2024-01-{:02},SHOP\n", day * 10, day));
        }
        let stmt = write(&f.dir, "stmt.csv", body.as_bytes());
        let id = write_id_image(&f.dir);
        let deed = write(&f.dir, "deed.pdf", b"not really a pdf");
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();
        f.wizard.upload(&mut session, DocumentKind::Identity, &id).unwrap();
        f.wizard.upload(&mut session, DocumentKind::SaleDeed, &deed).unwrap();

        match f.wizard.preview(&session, DocumentKind::BankStatement).unwrap() {
            Preview::Rows { rows } => {
                assert_eq!(rows.len(), 7);
                assert_eq!(rows[0].amount, 10.0);
            }
            other => panic!("expected rows, got {:?}", other),
        }
        assert_eq!(
            f.wizard.preview(&session, DocumentKind::Identity).unwrap(),
            Preview::Image { width: 4, height: 4 }
        );
        assert!(matches!(
            f.wizard.preview(&session, DocumentKind::SaleDeed),
            Err(StepError::Extraction { kind: DocumentKind::SaleDeed, .. })
        ));
        assert!(matches!(
            f.wizard.preview(&session, DocumentKind::CreditReport),
            Err(StepError::MissingDocument(DocumentKind::CreditReport))
        ));

        // previews never reach the model or the text cache
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert!(session.text_for(DocumentKind::SaleDeed).is_none());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate_chars("₹45,00,000", 3), "₹45");
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn test_verify_requires_identity() {
        let f = fixture(false);
        let mut session = Session::new();

        let err = f.wizard.verify(&mut session).unwrap_err();
        assert!(matches!(err, StepError::MissingDocument(DocumentKind::Identity)));
        assert_eq!(err.to_string(), "Identification Document not uploaded!");
    }

    #[test]
    fn test_verify_is_memoized() {
        let f = fixture(false);
        let mut session = Session::new();
        let id = write_id_image(&f.dir);
        f.wizard.upload(&mut session, DocumentKind::Identity, &id).unwrap();

        let report = f.wizard.verify(&mut session).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        f.wizard.verify(&mut session).unwrap();
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_deed_is_not_matched() {
        let f = fixture(false);
        let mut session = Session::new();
        let id = write_id_image(&f.dir);
        let deed = write(&f.dir, "deed.pdf", b"not really a pdf");
        f.wizard.upload(&mut session, DocumentKind::Identity, &id).unwrap();
        f.wizard.upload(&mut session, DocumentKind::SaleDeed, &deed).unwrap();

        let report = f.wizard.verify(&mut session).unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(!report.results[0].matched);
        assert_eq!(report.mismatches(), vec![DocumentKind::SaleDeed]);
        assert!(matches!(
            session.text_for(DocumentKind::SaleDeed),
            Some(DocumentText::Failed(_))
        ));
        // only the identity summary reached the model
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_summarize_bank_only() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();

        let report = f.wizard.summarize(&mut session, Window::Total);
        assert!(report.warnings.is_empty());
        let bank = report.bank.unwrap();
        assert_eq!(bank.summary.savings, 3600.0);
        assert!(report.summaries[&DocumentKind::BankStatement].contains("Rs 3600.00"));
        // bank analysis is arithmetic, never a model call
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bank_error_is_inline_warning() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", b"DATE,AMOUNT\n2024-01-01,5\n");
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();

        let report = f.wizard.summarize(&mut session, Window::Weekly);
        assert!(report.bank.is_none());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Missing required columns"));
    }

    #[test]
    fn test_window_switch_replaces_bank_summary() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();

        f.wizard.summarize(&mut session, Window::Total);
        f.wizard.summarize(&mut session, Window::Weekly);

        let summaries = session.current_summaries();
        assert!(summaries[&DocumentKind::BankStatement].contains("Weekly View"));
        assert!(session.bank_analysis(Window::Total).is_some());
        assert!(session.bank_analysis(Window::Weekly).is_some());
    }

    #[test]
    fn test_profile_requires_summaries() {
        let f = fixture(false);
        let mut session = Session::new();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let err = f.wizard.build_profile(&mut session, today).unwrap_err();
        assert!(matches!(err, StepError::NoSummaries));
        assert_eq!(err.to_string(), "No document summaries found. Please restart the process.");
    }

    #[test]
    fn test_profile_memoized_until_summaries_change() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        f.wizard.summarize(&mut session, Window::Total);
        let first = f.wizard.build_profile(&mut session, today).unwrap();
        let again = f.wizard.build_profile(&mut session, today).unwrap();
        assert_eq!(first, again);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        f.wizard.summarize(&mut session, Window::Monthly);
        f.wizard.build_profile(&mut session, today).unwrap();
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_profile_dropped_when_statement_changes() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        f.wizard.summarize(&mut session, Window::Total);
        f.wizard.build_profile(&mut session, today).unwrap();
        f.wizard.answer(&mut session, "Savings?").unwrap();
        assert!(session.profile().is_some());

        // same name, unusable columns
        let stmt = write(&f.dir, "stmt.csv", b"DATE,AMOUNT\n2024-01-01,5\n");
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();
        let report = f.wizard.summarize(&mut session, Window::Total);
        assert_eq!(report.warnings.len(), 1);

        assert!(session.current_summaries().is_empty());
        assert!(session.profile().is_none());
        assert!(session.last_answer().is_none());
        assert!(matches!(
            f.wizard.build_profile(&mut session, today),
            Err(StepError::NoSummaries)
        ));
        assert!(matches!(
            f.wizard.answer(&mut session, "Savings?"),
            Err(StepError::NoProfile)
        ));
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_answer_validation() {
        let f = fixture(false);
        let mut session = Session::new();

        assert!(matches!(
            f.wizard.answer(&mut session, "   "),
            Err(StepError::EmptyQuestion)
        ));
        assert!(matches!(
            f.wizard.answer(&mut session, "Loan eligibility?"),
            Err(StepError::NoProfile)
        ));
    }

    #[test]
    fn test_answer_is_never_memoized() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());
        f.wizard.upload(&mut session, DocumentKind::BankStatement, &stmt).unwrap();
        f.wizard.summarize(&mut session, Window::Total);
        f.wizard
            .build_profile(&mut session, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .unwrap();

        f.wizard.answer(&mut session, "Savings?").unwrap();
        f.wizard.answer(&mut session, "Savings?").unwrap();
        assert_eq!(f.calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.last_answer().unwrap().question, "Savings?");
    }

    #[test]
    fn test_model_failure_uses_fallback() {
        let f = fixture(true);
        let mut session = Session::new();
        let id = write_id_image(&f.dir);
        f.wizard.upload(&mut session, DocumentKind::Identity, &id).unwrap();

        assert_eq!(f.wizard.extract_identity(&mut session).unwrap(), FALLBACK_RESPONSE);
    }

    #[test]
    fn test_use_backend_documents_stages_present_files() {
        let f = fixture(false);
        let mut session = Session::new();
        let backend = f.dir.path().join("backend_documents");
        fs::create_dir_all(&backend).unwrap();
        fs::write(backend.join("Bank_Statement.csv"), STATEMENT).unwrap();

        let inventory = f.wizard.use_backend_documents(&mut session).unwrap();
        assert!(!inventory.all_docs_uploaded);
        assert_eq!(inventory.missing_files.len(), 3);

        let staged = session.upload(DocumentKind::BankStatement).unwrap();
        assert_eq!(staged.path, f.dir.path().join("temp").join("Bank_Statement.csv"));
        assert!(session.upload(DocumentKind::Identity).is_none());
    }

    #[test]
    fn test_upload_rejects_wrong_slot() {
        let f = fixture(false);
        let mut session = Session::new();
        let stmt = write(&f.dir, "stmt.csv", STATEMENT.as_bytes());

        let err = f
            .wizard
            .upload(&mut session, DocumentKind::SaleDeed, &stmt)
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::Upload(UploadError::RejectedExtension { .. })
        ));
        assert!(session.uploads().is_empty());
    }
}
