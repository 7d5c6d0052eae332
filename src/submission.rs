//! Submission pipeline.
//!
//! Finalizing a session is terminal: the clock freezes, a single immutable
//! `SubmissionReport` is assembled from in-memory state, a local JSON
//! artifact is always written, and a best-effort network notification is
//! attempted afterwards. Delivery failure never invalidates the artifact,
//! and a second submission attempt is refused at the state-machine level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::assistant::{Assistant, ChatTurn, RenderedMessage};
use crate::backend::NotificationSender;
use crate::scoring::{HesBreakdown, InteractionCounters, WeightTable};
use crate::session::{Field, ScoringSession};
use crate::typing::CadenceSummary;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission: already submitted")]
    AlreadySubmitted,
    #[error("submission: response draft is empty")]
    EmptyDraft,
    #[error("submission: export failed - {0}")]
    Export(#[from] std::io::Error),
    #[error("submission: serialization failed - {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Elapsed time on page, raw and human-readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOnPage {
    pub seconds: u64,
    pub formatted: String,
}

impl TimeOnPage {
    fn from_seconds(seconds: f64) -> Self {
        let total = seconds.round().max(0.0) as u64;
        Self {
            seconds: total,
            formatted: format_duration(total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub time_on_page: TimeOnPage,
    pub total_interactions: u64,
}

/// The score with everything needed to audit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HesReport {
    pub calculated: u64,
    pub raw: InteractionCounters,
    pub weights: WeightTable,
    pub breakdown: HesBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadenceReport {
    pub response: CadenceSummary,
    pub chat: CadenceSummary,
}

/// Immutable end-of-session snapshot; created exactly once.
///
/// Field names follow the notification wire contract. The chat history is
/// taken from the rendered message log, not the model turn list, so it
/// captures exactly what the user saw including system and error lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    pub advice_post: String,
    pub final_response: String,
    pub word_count: usize,
    pub draft_similarity: u32,
    pub draft_sha256: String,
    pub human_effort_score: HesReport,
    pub chat_history: Vec<RenderedMessage>,
    pub conversation_turns: Vec<ChatTurn>,
    pub ai_texts_generated: usize,
    pub metrics: SessionMetrics,
    pub cadence: CadenceReport,
}

/// How the notification attempt ended. Orthogonal to the local export,
/// which has already succeeded by the time this is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryStatus {
    Delivered { message: String },
    Failed { error: String },
    /// No notifier configured; local export only.
    Skipped,
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub report: SubmissionReport,
    pub artifact_path: PathBuf,
    pub delivery: DeliveryStatus,
}

/// Drives the `Editing -> Submitted` transition. Terminal once submitted.
pub struct SubmissionCoordinator {
    export_dir: PathBuf,
    submitted: bool,
}

impl SubmissionCoordinator {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            submitted: false,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Finalize the session and deliver the report.
    ///
    /// The caller is responsible for user confirmation before invoking
    /// this. On export failure both the coordinator and the session stay
    /// editable so the user can retry; once the artifact is on disk the
    /// state is terminal regardless of the notification outcome.
    pub async fn submit(
        &mut self,
        session: &mut ScoringSession,
        assistant: &Assistant,
        draft: &str,
        advice_post: &str,
        notifier: Option<&dyn NotificationSender>,
        now_ms: i64,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if self.submitted {
            return Err(SubmitError::AlreadySubmitted);
        }
        if draft.trim().is_empty() {
            return Err(SubmitError::EmptyDraft);
        }

        // The report is assembled from live state and the session is only
        // closed once the artifact is safely on disk, so a failed export
        // leaves everything editable for a retry.
        let report = build_report(session, assistant, draft, advice_post, now_ms);

        let artifact_path = export_report(&self.export_dir, &report)?;
        session.finalize(now_ms);
        self.submitted = true;
        log::info!("submission exported to {artifact_path:?}");

        let delivery = match notifier {
            Some(notifier) => match notifier.send(&report).await {
                Ok(receipt) if receipt.success => DeliveryStatus::Delivered {
                    message: receipt.message,
                },
                Ok(receipt) => DeliveryStatus::Failed {
                    error: receipt.message,
                },
                Err(err) => {
                    log::warn!("submission notification failed: {err}");
                    DeliveryStatus::Failed {
                        error: err.to_string(),
                    }
                }
            },
            None => DeliveryStatus::Skipped,
        };

        Ok(SubmissionOutcome {
            report,
            artifact_path,
            delivery,
        })
    }
}

fn build_report(
    session: &ScoringSession,
    assistant: &Assistant,
    draft: &str,
    advice_post: &str,
    now_ms: i64,
) -> SubmissionReport {
    let counters = *session.counters();
    let elapsed = session.elapsed_seconds(now_ms);
    let ai_share = session.ai_share(draft);
    let breakdown = session.breakdown(draft, now_ms);
    let calculated = session.hes(draft, now_ms);

    SubmissionReport {
        timestamp: Utc::now(),
        session_id: session.id(),
        advice_post: advice_post.to_string(),
        final_response: draft.to_string(),
        word_count: draft.split_whitespace().count(),
        draft_similarity: ai_share,
        draft_sha256: hex::encode(Sha256::digest(draft.as_bytes())),
        human_effort_score: HesReport {
            calculated,
            raw: counters,
            weights: *session.weights(),
            breakdown,
        },
        chat_history: assistant.message_log().to_vec(),
        conversation_turns: assistant.turns().to_vec(),
        ai_texts_generated: session.corpus().len(),
        metrics: SessionMetrics {
            time_on_page: TimeOnPage::from_seconds(elapsed),
            total_interactions: counters.total(),
        },
        cadence: CadenceReport {
            response: session.cadence_summary(Field::ResponseDraft),
            chat: session.cadence_summary(Field::ChatInput),
        },
    }
}

fn export_report(export_dir: &Path, report: &SubmissionReport) -> Result<PathBuf, SubmitError> {
    fs::create_dir_all(export_dir)?;
    let stamp = report.timestamp.format("%Y%m%dT%H%M%S");
    let short_id = &report.session_id.simple().to_string()[..8];
    let path = export_dir.join(format!("submission-{stamp}-{short_id}.json"));
    let raw = serde_json::to_string_pretty(report)?;
    fs::write(&path, raw)?;
    Ok(path)
}

fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, DeliveryReceipt, GenerateReply, ModelBackend};
    use crate::config::HesConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct SilentBackend;

    #[async_trait]
    impl ModelBackend for SilentBackend {
        fn name(&self) -> &str {
            "silent"
        }
        async fn generate(&self, _prompt: &str) -> Result<GenerateReply, BackendError> {
            Err(BackendError::Unavailable("not scripted".into()))
        }
    }

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingNotifier {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl NotificationSender for CountingNotifier {
        async fn send(&self, _report: &SubmissionReport) -> Result<DeliveryReceipt, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackendError::Network("unreachable".into()))
            } else {
                Ok(DeliveryReceipt {
                    success: true,
                    message: "sent".into(),
                })
            }
        }
    }

    fn fixtures() -> (ScoringSession, Assistant) {
        let session = ScoringSession::new(&HesConfig::default(), 0);
        let assistant = Assistant::new(Arc::new(SilentBackend), "advice passage");
        (session, assistant)
    }

    #[tokio::test]
    async fn test_submit_writes_exactly_one_artifact() {
        let tmp = TempDir::new().unwrap();
        let (mut session, assistant) = fixtures();
        let mut coordinator = SubmissionCoordinator::new(tmp.path());

        let outcome = coordinator
            .submit(&mut session, &assistant, "my final answer", "advice", None, 60_000)
            .await
            .unwrap();
        assert!(outcome.artifact_path.exists());
        assert_eq!(outcome.delivery, DeliveryStatus::Skipped);

        // Second attempt is refused and writes nothing new.
        let err = coordinator
            .submit(&mut session, &assistant, "my final answer", "advice", None, 61_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_draft_blocks_submission() {
        let tmp = TempDir::new().unwrap();
        let (mut session, assistant) = fixtures();
        let mut coordinator = SubmissionCoordinator::new(tmp.path());

        let err = coordinator
            .submit(&mut session, &assistant, "   \n", "advice", None, 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::EmptyDraft));
        assert!(!coordinator.is_submitted());
        assert!(!session.is_submitted());
    }

    #[tokio::test]
    async fn test_export_failure_leaves_session_editable() {
        let tmp = TempDir::new().unwrap();
        // A plain file where the export directory should go makes the
        // directory creation fail.
        let blocker = tmp.path().join("exports");
        fs::write(&blocker, "in the way").unwrap();

        let (mut session, assistant) = fixtures();
        let mut coordinator = SubmissionCoordinator::new(&blocker);

        let err = coordinator
            .submit(&mut session, &assistant, "final text", "advice", None, 10_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Export(_)), "{err:?}");
        assert!(!coordinator.is_submitted());
        assert!(!session.is_submitted());

        // The session still accepts events and the clock never froze.
        assert!(session.record_keystroke(Field::ResponseDraft, "f", 11_000).is_ok());
        assert_eq!(session.counters().response_typing, 1);
        assert_eq!(session.elapsed_seconds(20_000), 20.0);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_local_artifact() {
        let tmp = TempDir::new().unwrap();
        let (mut session, assistant) = fixtures();
        let mut coordinator = SubmissionCoordinator::new(tmp.path());
        let notifier = CountingNotifier::new(true);

        let outcome = coordinator
            .submit(&mut session, &assistant, "final text", "advice", Some(&notifier), 5_000)
            .await
            .unwrap();
        assert!(matches!(outcome.delivery, DeliveryStatus::Failed { .. }));
        assert!(outcome.artifact_path.exists());
        assert!(coordinator.is_submitted());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_report_snapshot_contents() {
        let tmp = TempDir::new().unwrap();
        let (mut session, assistant) = fixtures();
        session.note_prompt_counted();
        session.push_ai_text("an assistant reply used for provenance here");
        let mut coordinator = SubmissionCoordinator::new(tmp.path());
        let notifier = CountingNotifier::new(false);

        let draft = "an assistant reply used for provenance here plus my own words";
        let outcome = coordinator
            .submit(&mut session, &assistant, draft, "the advice post", Some(&notifier), 90_000)
            .await
            .unwrap();

        let report = &outcome.report;
        assert_eq!(report.word_count, 11);
        assert!(report.draft_similarity > 0);
        assert_eq!(report.ai_texts_generated, 1);
        assert_eq!(report.human_effort_score.raw.ai_prompts, 1);
        assert_eq!(report.metrics.time_on_page.seconds, 90);
        assert_eq!(report.metrics.time_on_page.formatted, "1m 30s");
        assert_eq!(report.draft_sha256.len(), 64);
        assert!(matches!(outcome.delivery, DeliveryStatus::Delivered { .. }));

        // The artifact on disk round-trips to the same snapshot.
        let raw = fs::read_to_string(&outcome.artifact_path).unwrap();
        let parsed: SubmissionReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.human_effort_score.calculated, report.human_effort_score.calculated);
        assert_eq!(parsed.final_response, draft);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(192), "3m 12s");
        assert_eq!(format_duration(3723), "1h 2m 3s");
    }
}
