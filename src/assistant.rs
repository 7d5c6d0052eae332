//! Assistant chat layer.
//!
//! Drives the conversation between the user and the model backend while
//! keeping the scoring session honest: prompts are counted only when the
//! relevance pre-check passes and a reply actually arrives, feedback
//! requests go through the draft-change gate, and every AI text surfaced to
//! the user lands in the provenance corpus in arrival order.
//!
//! Two transcripts are maintained on purpose. The rendered message log is
//! everything the user saw, including deflections and error lines; the turn
//! list is only the prompt/response pairs actually exchanged with the
//! model. The submission report carries both.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::ModelBackend;
use crate::session::{FeedbackRejection, ScoringSession};

/// Shown when the relevance pre-check judges a prompt off-topic.
const DEFLECTION_MESSAGE: &str =
    "Let's stay focused on the advice request. Ask me something about the situation you're responding to.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One line of the rendered chat, exactly as the user saw it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub role: ChatRole,
    pub text: String,
}

/// One prompt/response pair actually sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub prompt: String,
    pub response: String,
}

/// Result of a user chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    /// Relevance passed, reply delivered and counted.
    Answered(String),
    /// Relevance pre-check said no; deflection shown, nothing counted.
    OffTopic(String),
    /// Backend failure; error line shown, nothing counted.
    Failed(String),
    /// Empty input, dropped silently.
    Ignored,
}

/// Result of a feedback request on the draft.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    Delivered(String),
    Rejected(FeedbackRejection),
    Failed(String),
}

pub struct Assistant {
    backend: Arc<dyn ModelBackend>,
    advice_passage: String,
    log: Vec<RenderedMessage>,
    turns: Vec<ChatTurn>,
}

impl Assistant {
    /// `advice_passage` may be empty when the loader failed; prompts then
    /// carry no situation context but the chat keeps working.
    pub fn new(backend: Arc<dyn ModelBackend>, advice_passage: impl Into<String>) -> Self {
        Self {
            backend,
            advice_passage: advice_passage.into(),
            log: Vec::new(),
            turns: Vec::new(),
        }
    }

    pub fn message_log(&self) -> &[RenderedMessage] {
        &self.log
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Record a line the adapter rendered outside the chat flow (greetings,
    /// submission status), so the report transcript matches the screen.
    pub fn push_system_line(&mut self, text: impl Into<String>) {
        self.log.push(RenderedMessage {
            role: ChatRole::System,
            text: text.into(),
        });
    }

    /// Handle a user chat message end to end: relevance pre-check, full
    /// completion, corpus append and prompt counting.
    pub async fn send_message(
        &mut self,
        session: &mut ScoringSession,
        message: &str,
    ) -> PromptOutcome {
        let message = message.trim();
        if message.is_empty() {
            return PromptOutcome::Ignored;
        }

        self.log.push(RenderedMessage {
            role: ChatRole::User,
            text: message.to_string(),
        });

        if !self.check_relevance(message).await {
            self.log.push(RenderedMessage {
                role: ChatRole::Assistant,
                text: DEFLECTION_MESSAGE.to_string(),
            });
            return PromptOutcome::OffTopic(DEFLECTION_MESSAGE.to_string());
        }

        let prompt = self.chat_prompt(message);
        match self.backend.generate(&prompt).await {
            Ok(reply) => {
                session.push_ai_text(reply.response.clone());
                session.note_prompt_counted();
                self.log.push(RenderedMessage {
                    role: ChatRole::Assistant,
                    text: reply.response.clone(),
                });
                self.turns.push(ChatTurn {
                    prompt,
                    response: reply.response.clone(),
                });
                PromptOutcome::Answered(reply.response)
            }
            Err(err) => {
                log::warn!("chat completion failed: {err}");
                let line = format!("The assistant is unavailable right now ({err}). Please try again.");
                self.push_system_line(line.clone());
                PromptOutcome::Failed(line)
            }
        }
    }

    /// Handle a feedback request on the current draft.
    pub async fn request_feedback(
        &mut self,
        session: &mut ScoringSession,
        draft: &str,
    ) -> FeedbackOutcome {
        if let Err(rejection) = session.check_feedback_gate(draft) {
            self.push_system_line(rejection.message());
            return FeedbackOutcome::Rejected(rejection);
        }

        let prompt = self.feedback_prompt(draft);
        match self.backend.generate(&prompt).await {
            Ok(reply) => {
                session.push_ai_text(reply.response.clone());
                session.note_feedback_counted(draft);
                self.log.push(RenderedMessage {
                    role: ChatRole::Assistant,
                    text: reply.response.clone(),
                });
                self.turns.push(ChatTurn {
                    prompt,
                    response: reply.response.clone(),
                });
                FeedbackOutcome::Delivered(reply.response)
            }
            Err(err) => {
                log::warn!("feedback completion failed: {err}");
                let line = format!("Feedback is unavailable right now ({err}). Please try again.");
                self.push_system_line(line.clone());
                FeedbackOutcome::Failed(line)
            }
        }
    }

    /// Relevance pre-check against the advice passage. Fails open: a
    /// backend error never blocks the user.
    async fn check_relevance(&self, message: &str) -> bool {
        let prompt = format!(
            "Advice request:\n{}\n\nA user chatting with a writing assistant asked: \"{}\"\n\nIs that question relevant to responding to the advice request? Answer yes or no.",
            self.advice_passage, message
        );
        match self.backend.generate(&prompt).await {
            Ok(reply) => is_affirmative(&reply.response),
            Err(err) => {
                log::warn!("relevance check failed, treating prompt as relevant: {err}");
                true
            }
        }
    }

    fn chat_prompt(&self, message: &str) -> String {
        format!(
            "You are a writing assistant helping someone respond to this advice request:\n{}\n\nUser: {}",
            self.advice_passage, message
        )
    }

    fn feedback_prompt(&self, draft: &str) -> String {
        format!(
            "Advice request:\n{}\n\nGive brief, constructive feedback on this draft response:\n{}",
            self.advice_passage, draft
        )
    }
}

/// Extract a yes/no judgement embedded in free text. Only whole words
/// count, so "noise" or "cannot" never read as a verdict. Anything
/// ambiguous counts as yes, consistent with the fail-open policy.
fn is_affirmative(text: &str) -> bool {
    for token in text.split_whitespace() {
        let word = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match word.as_str() {
            "yes" => return true,
            "no" => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, GenerateReply};
    use crate::config::HesConfig;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted backend: pops one canned result per generate call.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl crate::backend::ModelBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> Result<GenerateReply, BackendError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(BackendError::Unavailable("script exhausted".into())))
                .map(|response| GenerateReply {
                    response,
                    model: None,
                    total_duration: None,
                    eval_count: None,
                })
        }
    }

    fn session() -> ScoringSession {
        ScoringSession::new(&HesConfig::default(), 0)
    }

    fn long_draft() -> String {
        (0..35).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_relevant_prompt_is_answered_and_counted() {
        let backend = ScriptedBackend::new(vec![
            Ok("Yes, that is relevant.".into()),
            Ok("Try opening with empathy.".into()),
        ]);
        let mut assistant = Assistant::new(backend, "My roommate is too loud.");
        let mut s = session();

        let outcome = assistant.send_message(&mut s, "How should I start?").await;
        assert_eq!(outcome, PromptOutcome::Answered("Try opening with empathy.".into()));
        assert_eq!(s.counters().ai_prompts, 1);
        assert_eq!(s.corpus().len(), 1);
        assert_eq!(assistant.turns().len(), 1);
        // User line plus assistant line in the rendered log.
        assert_eq!(assistant.message_log().len(), 2);
    }

    #[tokio::test]
    async fn test_off_topic_prompt_is_deflected_not_counted() {
        let backend = ScriptedBackend::new(vec![Ok("No, that is unrelated.".into())]);
        let mut assistant = Assistant::new(backend, "My roommate is too loud.");
        let mut s = session();

        let outcome = assistant.send_message(&mut s, "What's the weather?").await;
        assert!(matches!(outcome, PromptOutcome::OffTopic(_)));
        assert_eq!(s.counters().ai_prompts, 0);
        assert!(s.corpus().is_empty());
        assert!(assistant.turns().is_empty());
    }

    #[tokio::test]
    async fn test_relevance_check_fails_open() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Network("timeout".into())),
            Ok("Here is an idea.".into()),
        ]);
        let mut assistant = Assistant::new(backend, "Situation text.");
        let mut s = session();

        let outcome = assistant.send_message(&mut s, "Any ideas?").await;
        assert!(matches!(outcome, PromptOutcome::Answered(_)));
        assert_eq!(s.counters().ai_prompts, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_scoring_state_unchanged() {
        let backend = ScriptedBackend::new(vec![
            Ok("yes".into()),
            Err(BackendError::Status(502)),
        ]);
        let mut assistant = Assistant::new(backend, "Situation text.");
        let mut s = session();

        let outcome = assistant.send_message(&mut s, "Any ideas?").await;
        assert!(matches!(outcome, PromptOutcome::Failed(_)));
        assert_eq!(s.counters().ai_prompts, 0);
        assert!(s.corpus().is_empty());
        // The failure line is part of what the user saw.
        assert!(matches!(
            assistant.message_log().last().unwrap().role,
            ChatRole::System
        ));
    }

    #[tokio::test]
    async fn test_feedback_gate_rejection_skips_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let mut assistant = Assistant::new(backend, "Situation text.");
        let mut s = session();

        let outcome = assistant.request_feedback(&mut s, "too short").await;
        assert!(matches!(outcome, FeedbackOutcome::Rejected(_)));
        assert_eq!(s.counters().ai_feedback, 0);
    }

    #[tokio::test]
    async fn test_feedback_delivery_counts_once() {
        let backend = ScriptedBackend::new(vec![Ok("Tighten the second paragraph.".into())]);
        let mut assistant = Assistant::new(backend, "Situation text.");
        let mut s = session();

        let outcome = assistant.request_feedback(&mut s, &long_draft()).await;
        assert!(matches!(outcome, FeedbackOutcome::Delivered(_)));
        assert_eq!(s.counters().ai_feedback, 1);
        assert_eq!(s.corpus().len(), 1);
    }

    #[tokio::test]
    async fn test_corpus_preserves_arrival_order() {
        let backend = ScriptedBackend::new(vec![
            Ok("yes".into()),
            Ok("first reply".into()),
            Ok("yes".into()),
            Ok("second reply".into()),
        ]);
        let mut assistant = Assistant::new(backend, "Situation text.");
        let mut s = session();

        assistant.send_message(&mut s, "one?").await;
        assistant.send_message(&mut s, "two?").await;
        assert_eq!(s.corpus().texts(), ["first reply", "second reply"]);
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("Yes, clearly relevant."));
        assert!(is_affirmative("I think the answer is yes."));
        assert!(!is_affirmative("No."));
        assert!(!is_affirmative("That is not relevant, so no."));
        // Ambiguous judgements fail open.
        assert!(is_affirmative("Hard to say."));
        // Words merely containing "no" or "yes" are not verdicts.
        assert!(is_affirmative("That question is clearly about the noise complaint."));
        assert!(is_affirmative("I cannot say whether it applies, but it is not unrelated."));
        assert!(!is_affirmative("Clearly unrelated to the noise complaint, so: no."));
    }

    #[tokio::test]
    async fn test_judgement_wording_does_not_deflect_relevant_prompt() {
        let backend = ScriptedBackend::new(vec![
            Ok("That question is clearly about the noise complaint.".into()),
            Ok("Mention the late hours specifically.".into()),
        ]);
        let mut assistant = Assistant::new(backend, "My roommate is too loud.");
        let mut s = session();

        let outcome = assistant.send_message(&mut s, "Should I mention the noise?").await;
        assert!(matches!(outcome, PromptOutcome::Answered(_)), "{outcome:?}");
        assert_eq!(s.counters().ai_prompts, 1);
    }
}
