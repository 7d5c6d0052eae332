//! External collaborator interfaces.
//!
//! The scoring core talks to three collaborators: the model backend that
//! generates assistant replies (and relevance judgements), the notification
//! sender used once at submission time, and the advice-passage loader that
//! supplies the situation text injected into prompts. Each is a trait so
//! the core and its tests never depend on transport details; the provided
//! implementations are thin reqwest/filesystem clients.

mod notify;
mod ollama;
mod passage;

pub use notify::HttpNotifier;
pub use ollama::OllamaBackend;
pub use passage::FilePassageLoader;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::submission::SubmissionReport;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend: network error - {0}")]
    Network(String),
    #[error("backend: unexpected status {0}")]
    Status(u16),
    #[error("backend: malformed response - {0}")]
    Malformed(String),
    #[error("backend: unavailable - {0}")]
    Unavailable(String),
    #[error("backend: io error - {0}")]
    Io(#[from] std::io::Error),
}

/// One model completion with the generation metadata the UI surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReply {
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Total generation time in nanoseconds, when the backend reports it.
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

/// Text-generation collaborator.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<GenerateReply, BackendError>;
}

/// Outcome of a submission notification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Submission-time notification collaborator. Failure is never fatal to
/// the local export.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, report: &SubmissionReport) -> Result<DeliveryReceipt, BackendError>;
}

/// Supplies the advice-request passage shown to the user and injected into
/// prompts. A load failure yields an empty context upstream, not a crash.
pub trait PassageLoader: Send + Sync {
    fn load(&self, identifier: &str) -> Result<String, BackendError>;
}
