// Customer Profiler - Core Library
// Exposes all modules for use in the TUI, the API server, and tests

pub mod config;
pub mod logging;
pub mod documents;
pub mod extract;
pub mod bank;
pub mod charts;
pub mod prompts;
pub mod llm;
pub mod session;
pub mod wizard;

// Re-export commonly used types
pub use config::{Config, ConfigError, ModelConfig, OcrConfig, ServerConfig};
pub use logging::init_logging;
pub use documents::{
    BackendFolder, BackendInventory, Document, DocumentKind, Staging, UploadError,
    content_hash,
};
pub use extract::{ExtractionError, FileFormat, OcrEngine, TesseractCli, TextExtractor};
pub use bank::{
    BankAnalysis, BankStatementError, BankSummary, BankTransaction, Indicator, Window,
    analyze, analyze_rows, load_statement,
};
pub use charts::{ChartError, ChartSet};
pub use llm::{
    Assistant, DocumentSummary, ModelBackend, ModelInvocationError, OllamaCli,
    VerificationResult, FALLBACK_RESPONSE,
};
pub use session::{CustomerProfile, DocumentText, QueryAnswer, Session, Step};
pub use wizard::{Preview, StepError, SummaryReport, VerificationReport, Wizard};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
