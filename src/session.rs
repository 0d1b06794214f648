// 🗂️ Session - one operator's pass through the wizard
// Every memoized artifact remembers the content hash it was derived from,
// so re-uploading a slot with different bytes invalidates it without bookkeeping.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;
use uuid::Uuid;

use crate::bank::{BankAnalysis, Window};
use crate::documents::{content_hash, Document, DocumentKind};
use crate::llm::{profile_json, VerificationResult};

const PROFILE_DERIVATION: &str = "profile";

// ============================================================================
// STEPS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    Flash,
    Start,
    Upload,
    Verify,
    Summarize,
    Profile,
}

impl Step {
    /// Steps shown in the header (the splash is not a tab)
    pub const TABS: [Step; 5] = [
        Step::Start,
        Step::Upload,
        Step::Verify,
        Step::Summarize,
        Step::Profile,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Step::Flash => "Welcome",
            Step::Start => "Start",
            Step::Upload => "Upload Documents",
            Step::Verify => "Verify Details",
            Step::Summarize => "Summarize Documents",
            Step::Profile => "Customer Profile",
        }
    }

    pub fn next(self) -> Step {
        match self {
            Step::Flash => Step::Start,
            Step::Start => Step::Upload,
            Step::Upload => Step::Verify,
            Step::Verify => Step::Summarize,
            Step::Summarize | Step::Profile => Step::Profile,
        }
    }

    pub fn previous(self) -> Step {
        match self {
            Step::Flash => Step::Flash,
            Step::Start | Step::Upload => Step::Start,
            Step::Verify => Step::Upload,
            Step::Summarize => Step::Verify,
            Step::Profile => Step::Summarize,
        }
    }
}

// ============================================================================
// ARTIFACTS
// ============================================================================

/// Outcome of text extraction for one file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DocumentText {
    Text(String),
    /// csv/xlsx: read by the bank analyzer instead
    Tabular,
    Failed(String),
}

impl DocumentText {
    pub fn text(&self) -> Option<&str> {
        match self {
            DocumentText::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// What a memoized value was derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactKey {
    pub content_hash: String,
    pub derivation: String,
}

impl ArtifactKey {
    pub fn new(content_hash: impl Into<String>, derivation: impl Into<String>) -> Self {
        ArtifactKey {
            content_hash: content_hash.into(),
            derivation: derivation.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Memo<T> {
    pub key: ArtifactKey,
    pub value: T,
}

impl<T> Memo<T> {
    pub fn new(key: ArtifactKey, value: T) -> Self {
        Memo { key, value }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&T> {
        (self.key == *key).then_some(&self.value)
    }
}

/// Key of a profile built from exactly these summaries
pub(crate) fn profile_key(summaries: &BTreeMap<DocumentKind, String>) -> ArtifactKey {
    ArtifactKey::new(content_hash(profile_json(summaries).as_bytes()), PROFILE_DERIVATION)
}

/// The session's terminal artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerProfile {
    pub summaries: BTreeMap<DocumentKind, String>,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    pub answer: String,
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    step: Step,
    pub(crate) uploads: BTreeMap<DocumentKind, Document>,
    /// Extraction outcome per content hash
    pub(crate) texts: HashMap<String, DocumentText>,
    pub(crate) identity_summary: Option<Memo<String>>,
    pub(crate) verifications: BTreeMap<DocumentKind, Memo<VerificationResult>>,
    pub(crate) summaries: BTreeMap<DocumentKind, Memo<String>>,
    pub(crate) bank_analyses: HashMap<(String, Window), BankAnalysis>,
    pub(crate) profile: Option<Memo<CustomerProfile>>,
    pub(crate) last_answer: Option<QueryAnswer>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let session = Session {
            id: Uuid::new_v4(),
            step: Step::Flash,
            uploads: BTreeMap::new(),
            texts: HashMap::new(),
            identity_summary: None,
            verifications: BTreeMap::new(),
            summaries: BTreeMap::new(),
            bank_analyses: HashMap::new(),
            profile: None,
            last_answer: None,
        };
        info!(session = %session.id, "Session created");
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Splash timer elapsed
    pub fn finish_splash(&mut self) {
        if self.step == Step::Flash {
            self.step = Step::Start;
        }
    }

    pub fn advance(&mut self) -> Step {
        self.step = self.step.next();
        self.step
    }

    pub fn back(&mut self) -> Step {
        self.step = self.step.previous();
        self.step
    }

    /// Back to Start with every upload and derived artifact dropped
    pub fn restart(&mut self) {
        self.step = Step::Start;
        self.uploads.clear();
        self.texts.clear();
        self.identity_summary = None;
        self.verifications.clear();
        self.summaries.clear();
        self.bank_analyses.clear();
        self.profile = None;
        self.last_answer = None;
        info!(session = %self.id, "Session restarted");
    }

    // ------------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------------

    pub fn record_upload(&mut self, document: Document) {
        self.uploads.insert(document.kind, document);
    }

    pub fn upload(&self, kind: DocumentKind) -> Option<&Document> {
        self.uploads.get(&kind)
    }

    pub fn uploads(&self) -> &BTreeMap<DocumentKind, Document> {
        &self.uploads
    }

    pub fn text_for(&self, kind: DocumentKind) -> Option<&DocumentText> {
        self.upload(kind)
            .and_then(|doc| self.texts.get(&doc.content_hash))
    }

    fn current_hash(&self, kind: DocumentKind) -> Option<&str> {
        self.upload(kind).map(|doc| doc.content_hash.as_str())
    }

    fn is_current(&self, kind: DocumentKind, key: &ArtifactKey) -> bool {
        self.current_hash(kind) == Some(key.content_hash.as_str())
    }

    // ------------------------------------------------------------------------
    // Artifacts still valid for the current uploads
    // ------------------------------------------------------------------------

    pub fn identity_summary(&self) -> Option<&str> {
        self.identity_summary
            .as_ref()
            .filter(|memo| self.is_current(DocumentKind::Identity, &memo.key))
            .map(|memo| memo.value.as_str())
    }

    pub fn verifications(&self) -> Vec<&VerificationResult> {
        self.verifications
            .iter()
            .filter(|(kind, memo)| self.is_current(**kind, &memo.key))
            .map(|(_, memo)| &memo.value)
            .collect()
    }

    /// Per-document summaries that feed the profile
    pub fn current_summaries(&self) -> BTreeMap<DocumentKind, String> {
        self.summaries
            .iter()
            .filter(|(kind, memo)| self.is_current(**kind, &memo.key))
            .map(|(kind, memo)| (*kind, memo.value.clone()))
            .collect()
    }

    pub fn bank_analysis(&self, window: Window) -> Option<&BankAnalysis> {
        let hash = self.current_hash(DocumentKind::BankStatement)?;
        self.bank_analyses.get(&(hash.to_string(), window))
    }

    /// The profile, only while it was built from the current summaries
    pub fn profile(&self) -> Option<&CustomerProfile> {
        let memo = self.profile.as_ref()?;
        memo.get(&profile_key(&self.current_summaries()))
    }

    pub fn last_answer(&self) -> Option<&QueryAnswer> {
        self.profile().and(self.last_answer.as_ref())
    }
}
