pub mod assistant;
pub mod backend;
pub mod config;
pub mod provenance;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod similarity;
pub mod submission;
pub mod typing;

// Re-export common types
pub use crate::assistant::{Assistant, ChatRole, FeedbackOutcome, PromptOutcome, RenderedMessage};
pub use crate::backend::{
    BackendError, DeliveryReceipt, FilePassageLoader, GenerateReply, HttpNotifier, ModelBackend,
    NotificationSender, OllamaBackend, PassageLoader,
};
pub use crate::config::{HesConfig, ModelConfig, Thresholds};
pub use crate::provenance::{estimate_ai_share, AiCorpus};
pub use crate::scoring::{compute_hes, HesBreakdown, InteractionCounters, WeightTable};
pub use crate::session::{Field, Panel, ScoringSession};
pub use crate::similarity::similarity;
pub use crate::submission::{
    DeliveryStatus, SubmissionCoordinator, SubmissionOutcome, SubmissionReport, SubmitError,
};
pub use crate::typing::{RejectReason, TypingPatternState, TypingRules};
