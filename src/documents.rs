// 📂 Documents - kinds, upload staging, backend reference folder
// Every staged document carries a SHA-256 of its bytes; downstream caches key on it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// DOCUMENT KIND
// ============================================================================

/// The four document slots of a profiling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "Identification Document")]
    Identity,
    #[serde(rename = "Sale Deed")]
    SaleDeed,
    #[serde(rename = "Credit Score Report")]
    CreditReport,
    #[serde(rename = "Bank Statement")]
    BankStatement,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Identity,
        DocumentKind::SaleDeed,
        DocumentKind::CreditReport,
        DocumentKind::BankStatement,
    ];

    /// Human-readable name for display and prompts
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Identity => "Identification Document",
            DocumentKind::SaleDeed => "Sale Deed",
            DocumentKind::CreditReport => "Credit Score Report",
            DocumentKind::BankStatement => "Bank Statement",
        }
    }

    /// Extensions the upload slot accepts (lowercase, no dot)
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            DocumentKind::Identity => &["pdf", "png", "jpg", "jpeg"],
            DocumentKind::SaleDeed => &["pdf", "docx"],
            DocumentKind::CreditReport => &["pdf", "docx", "png", "jpg"],
            DocumentKind::BankStatement => &["csv", "xlsx"],
        }
    }

    /// File name of the pre-provisioned copy in the backend folder
    pub fn backend_file_name(&self) -> &'static str {
        match self {
            DocumentKind::Identity => "Identification_Document.png",
            DocumentKind::SaleDeed => "Sale_Deed.pdf",
            DocumentKind::CreditReport => "Credit_Score_Report.jpg",
            DocumentKind::BankStatement => "Bank_Statement.csv",
        }
    }

    /// Documents whose customer name is cross-checked against the ID
    pub fn is_verifiable(&self) -> bool {
        matches!(self, DocumentKind::SaleDeed | DocumentKind::CreditReport)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        match extension(path) {
            Some(ext) => self.accepted_extensions().contains(&ext.as_str()),
            None => false,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercased extension without the dot
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// SHA-256 hex digest of a byte slice
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// A staged upload. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub file_name: String,
    pub content_hash: String,
    pub size_bytes: u64,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{kind} does not accept '{file_name}' (allowed: {allowed})")]
    RejectedExtension {
        kind: DocumentKind,
        file_name: String,
        allowed: String,
    },

    #[error("Upload has no usable file name: {0}")]
    MissingFileName(String),

    #[error("I/O error staging {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// STAGING
// ============================================================================

/// Working directory where uploads are persisted by original file name.
/// Writes are create-or-overwrite without locking.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Staging { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stage raw upload bytes under `file_name` for the given slot
    pub fn stage_bytes(
        &self,
        kind: DocumentKind,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Document, UploadError> {
        // Only the final component is kept so uploads cannot escape the staging dir
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| UploadError::MissingFileName(file_name.to_string()))?
            .to_string();

        if !kind.accepts(Path::new(&file_name)) {
            return Err(UploadError::RejectedExtension {
                kind,
                file_name,
                allowed: kind.accepted_extensions().join(", "),
            });
        }

        fs::create_dir_all(&self.dir).map_err(|source| UploadError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(&file_name);
        fs::write(&path, bytes).map_err(|source| UploadError::Io {
            path: path.clone(),
            source,
        })?;

        let document = Document {
            kind,
            path,
            file_name,
            content_hash: content_hash(bytes),
            size_bytes: bytes.len() as u64,
        };

        info!(
            kind = %kind,
            path = %document.path.display(),
            bytes = document.size_bytes,
            "Staged document"
        );

        Ok(document)
    }

    /// Stage a file from disk (reads fully first, so re-staging a staged file is safe)
    pub fn stage_file(&self, kind: DocumentKind, source: &Path) -> Result<Document, UploadError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::MissingFileName(source.display().to_string()))?;

        if !kind.accepts(source) {
            return Err(UploadError::RejectedExtension {
                kind,
                file_name: file_name.to_string(),
                allowed: kind.accepted_extensions().join(", "),
            });
        }

        let bytes = fs::read(source).map_err(|source_err| UploadError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        self.stage_bytes(kind, file_name, &bytes)
    }
}

// ============================================================================
// BACKEND FOLDER
// ============================================================================

/// Fixed-path folder with the customer photo and expected-named reference documents
#[derive(Debug, Clone)]
pub struct BackendFolder {
    dir: PathBuf,
}

/// Result of checking which reference documents are present
#[derive(Debug, Clone, Serialize)]
pub struct BackendInventory {
    pub available: BTreeMap<DocumentKind, Option<PathBuf>>,
    pub all_docs_uploaded: bool,
    pub missing_files: Vec<DocumentKind>,
}

impl BackendFolder {
    pub const CUSTOMER_PHOTO: &'static str = "customer_image.png";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BackendFolder { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn expected_path(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(kind.backend_file_name())
    }

    /// Check which of the expected reference documents exist
    pub fn verify_documents(&self) -> BackendInventory {
        let mut available = BTreeMap::new();
        let mut missing_files = Vec::new();

        for kind in DocumentKind::ALL {
            let path = self.expected_path(kind);
            if path.is_file() {
                available.insert(kind, Some(path));
            } else {
                available.insert(kind, None);
                missing_files.push(kind);
            }
        }

        debug!(
            dir = %self.dir.display(),
            missing = missing_files.len(),
            "Checked backend documents"
        );

        BackendInventory {
            available,
            all_docs_uploaded: missing_files.is_empty(),
            missing_files,
        }
    }

    pub fn customer_photo(&self) -> Option<PathBuf> {
        let path = self.dir.join(Self::CUSTOMER_PHOTO);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_extensions() {
        assert!(DocumentKind::Identity.accepts(Path::new("id.JPEG")));
        assert!(DocumentKind::SaleDeed.accepts(Path::new("deed.docx")));
        assert!(!DocumentKind::SaleDeed.accepts(Path::new("deed.png")));
        assert!(DocumentKind::CreditReport.accepts(Path::new("report.jpg")));
        assert!(!DocumentKind::CreditReport.accepts(Path::new("report.jpeg")));
        assert!(DocumentKind::BankStatement.accepts(Path::new("stmt.xlsx")));
        assert!(!DocumentKind::BankStatement.accepts(Path::new("stmt")));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"hello");
        assert_eq!(a, content_hash(b"hello"));
        assert_ne!(a, content_hash(b"hello!"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_stage_bytes_overwrites_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path().join("temp"));

        let first = staging
            .stage_bytes(DocumentKind::BankStatement, "stmt.csv", b"a,b\n")
            .unwrap();
        let second = staging
            .stage_bytes(DocumentKind::BankStatement, "stmt.csv", b"a,b,c\n")
            .unwrap();

        assert_eq!(first.path, second.path);
        assert_ne!(first.content_hash, second.content_hash);
        assert_eq!(fs::read(&second.path).unwrap(), b"a,b,c\n");
    }

    #[test]
    fn test_stage_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        let err = staging
            .stage_bytes(DocumentKind::SaleDeed, "deed.txt", b"text")
            .unwrap_err();
        assert!(matches!(err, UploadError::RejectedExtension { .. }));
        assert!(err.to_string().contains("pdf, docx"));
    }

    #[test]
    fn test_stage_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        let doc = staging
            .stage_bytes(DocumentKind::Identity, "../../etc/id.png", b"png")
            .unwrap();
        assert_eq!(doc.file_name, "id.png");
        assert_eq!(doc.path, dir.path().join("id.png"));
    }

    #[test]
    fn test_stage_file_onto_itself() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let path = dir.path().join("stmt.csv");
        fs::write(&path, b"x,y\n1,2\n").unwrap();

        let doc = staging.stage_file(DocumentKind::BankStatement, &path).unwrap();
        assert_eq!(doc.path, path);
        assert_eq!(fs::read(&path).unwrap(), b"x,y\n1,2\n");
    }

    #[test]
    fn test_backend_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendFolder::new(dir.path());
        fs::write(dir.path().join("Sale_Deed.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("Bank_Statement.csv"), b"a\n").unwrap();

        let inventory = backend.verify_documents();
        assert!(!inventory.all_docs_uploaded);
        assert_eq!(
            inventory.missing_files,
            vec![DocumentKind::Identity, DocumentKind::CreditReport]
        );
        assert!(inventory.available[&DocumentKind::SaleDeed].is_some());
        assert!(backend.customer_photo().is_none());

        fs::write(dir.path().join("customer_image.png"), b"png").unwrap();
        assert!(backend.customer_photo().is_some());
    }

    #[test]
    fn test_kind_serializes_as_label() {
        let mut map = BTreeMap::new();
        map.insert(DocumentKind::SaleDeed, "summary");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Sale Deed":"summary"}"#);
    }
}
