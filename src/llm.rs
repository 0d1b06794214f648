// 🤖 LLM Summarizer / Query Layer
// Narrow synchronous seam: prompt in, text out. The shipped backend shells out to `ollama run <model>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ModelConfig;
use crate::documents::DocumentKind;
use crate::extract::sanitize;
use crate::prompts;

/// Sentinel substituted whenever the model cannot be invoked
pub const FALLBACK_RESPONSE: &str = "Unable to generate a response.";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ModelInvocationError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to the model process: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Model process timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// Anything that can turn a prompt into text. Swappable without touching callers.
pub trait ModelBackend: Send + Sync {
    fn run(&self, prompt: &str) -> Result<String, ModelInvocationError>;
}

impl<T: ModelBackend + ?Sized> ModelBackend for Box<T> {
    fn run(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        (**self).run(prompt)
    }
}

/// External model process, one spawn per call, prompt on stdin
#[derive(Debug, Clone)]
pub struct OllamaCli {
    program: String,
    model: String,
    timeout: Option<Duration>,
}

impl OllamaCli {
    pub fn new(program: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaCli {
            program: program.into(),
            model: model.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let cli = Self::new(config.program.clone(), config.model.clone());
        match config.timeout_secs {
            Some(secs) => cli.with_timeout(Duration::from_secs(secs)),
            None => cli,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ModelInvocationError> {
        let limit = match self.timeout {
            Some(limit) => limit,
            None => return Ok(child.wait()?),
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ModelInvocationError::Timeout(limit));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl ModelBackend for OllamaCli {
    fn run(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(["run", &self.model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ModelInvocationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // stdin and both pipes are serviced off-thread while we wait
        let stdin = child.stdin.take();
        let input = prompt.as_bytes().to_vec();
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&input),
            None => Ok(()),
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child)?;

        if let Ok(Err(e)) = writer.join() {
            debug!(error = %e, "Model process closed stdin early");
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(ModelInvocationError::NonZeroExit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let response = sanitize(String::from_utf8_lossy(&stdout).trim());
        info!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = response.len(),
            "Model responded"
        );
        Ok(response)
    }
}

// ============================================================================
// ARTIFACTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub kind: DocumentKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub kind: DocumentKind,
    pub matched: bool,
    /// Raw model judgment
    pub response: String,
}

impl VerificationResult {
    /// The judgment is a match iff the model said "YES" anywhere
    pub fn from_response(kind: DocumentKind, response: String) -> Self {
        VerificationResult {
            kind,
            matched: response.contains("YES"),
            response,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.matched {
            "Matched"
        } else {
            "Not Matched"
        }
    }
}

// ============================================================================
// ASSISTANT
// ============================================================================

/// Prompt-templated calls with the fallback policy applied at one place
pub struct Assistant<M: ModelBackend> {
    backend: M,
}

impl<M: ModelBackend> Assistant<M> {
    pub fn new(backend: M) -> Self {
        Assistant { backend }
    }

    pub fn backend(&self) -> &M {
        &self.backend
    }

    fn run_or_fallback(&self, prompt: &str, purpose: &str) -> String {
        match self.backend.run(prompt) {
            Ok(text) => text,
            Err(e) => {
                error!(purpose, error = %e, "Model invocation failed; using fallback text");
                FALLBACK_RESPONSE.to_string()
            }
        }
    }

    /// summarize(text) → text, per document kind.
    /// `None` for kinds that are never summarized by the model.
    pub fn summarize(&self, kind: DocumentKind, text: &str) -> Option<DocumentSummary> {
        let prompt = prompts::summary_prompt(kind, text)?;
        let summary = self.run_or_fallback(&prompt, kind.label());
        debug!(kind = %kind, summary = %summary, "Document summary");
        Some(DocumentSummary { kind, text: summary })
    }

    /// Cross-check the customer name in another document against the ID details
    pub fn verify_name(
        &self,
        identity_details: &str,
        doc_text: &str,
        kind: DocumentKind,
    ) -> VerificationResult {
        let prompt = prompts::name_match_prompt(identity_details, doc_text, kind);
        let response = self.run_or_fallback(&prompt, "name verification");
        let result = VerificationResult::from_response(kind, response);
        info!(kind = %kind, matched = result.matched, "Name verification");
        result
    }

    /// Final RM narrative over the per-document summaries
    pub fn generate_profile(&self, summaries: &BTreeMap<DocumentKind, String>, today: NaiveDate) -> String {
        let prompt = prompts::profile_prompt(&profile_json(summaries), today);
        self.run_or_fallback(&prompt, "customer profile")
    }

    /// answer(context, question) → text
    pub fn answer(&self, context_json: &str, question: &str) -> String {
        let prompt = prompts::query_prompt(context_json, question);
        self.run_or_fallback(&prompt, "profile query")
    }
}

/// Pretty JSON of the summary map, keyed by document label
pub fn profile_json(summaries: &BTreeMap<DocumentKind, String>) -> String {
    serde_json::to_string_pretty(summaries).unwrap_or_else(|_| "{}".to_string())
}
