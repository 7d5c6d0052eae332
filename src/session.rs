//! Scoring session: the single owner of all mutable scoring state.
//!
//! Every UI event (scroll, keystroke, chat action) flows through one
//! `ScoringSession`, which gates it, updates the raw counters and derived
//! state, and can report the current Human Effort Score on demand. There is
//! no ambient global state; adapters hold the session by `&mut` and pass
//! millisecond timestamps in, which keeps the core testable without any UI
//! harness. An embedding that spans OS threads must wrap the session in a
//! mutex; internally it assumes a single caller at a time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::HesConfig;
use crate::provenance::{estimate_ai_share, AiCorpus};
use crate::scoring::{compute_hes, HesBreakdown, InteractionCounters, WeightTable};
use crate::similarity::similarity;
use crate::typing::{
    classify, record, CadenceSummary, CadenceTracker, RejectReason, TypingPatternState,
    TypingRules,
};

/// Scrollable panels whose scroll events count toward the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Situation,
    Chat,
}

/// Input fields with independent typing-pattern state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ResponseDraft,
    ChatInput,
}

/// Why a feedback request was refused. Policy, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedbackRejection {
    DraftTooShort { words: usize, required: usize },
    InsufficientChange { change_pct: u32, required: u32 },
}

impl FeedbackRejection {
    pub fn message(&self) -> String {
        match self {
            FeedbackRejection::DraftTooShort { words, required } => format!(
                "Your response has {words} words. Write at least {required} words before requesting feedback."
            ),
            FeedbackRejection::InsufficientChange { change_pct, required } => format!(
                "Your response has only changed {change_pct}% since the last feedback. Revise at least {required}% of it first."
            ),
        }
    }
}

impl fmt::Display for FeedbackRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackRejection::DraftTooShort { .. } => write!(f, "draft_too_short"),
            FeedbackRejection::InsufficientChange { .. } => write!(f, "insufficient_change"),
        }
    }
}

/// Session-scoped scoring state for one page visit.
pub struct ScoringSession {
    id: Uuid,
    weights: WeightTable,
    rules: TypingRules,
    min_match_len: usize,
    scroll_throttle_ms: i64,
    feedback_min_words: usize,
    feedback_min_change_pct: u32,

    counters: InteractionCounters,
    corpus: AiCorpus,
    draft_pattern: TypingPatternState,
    chat_pattern: TypingPatternState,
    draft_cadence: CadenceTracker,
    chat_cadence: CadenceTracker,
    last_scroll_ms: [Option<i64>; 2],
    last_feedback_draft: Option<String>,

    start_ms: i64,
    frozen_seconds: Option<f64>,
    submitted: bool,
}

impl ScoringSession {
    pub fn new(config: &HesConfig, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            weights: config.weights,
            rules: config.typing.clone(),
            min_match_len: config.thresholds.min_match_len,
            scroll_throttle_ms: config.thresholds.scroll_throttle_ms,
            feedback_min_words: config.thresholds.feedback_min_words,
            feedback_min_change_pct: config.thresholds.feedback_min_change_pct,
            counters: InteractionCounters::default(),
            corpus: AiCorpus::new(),
            draft_pattern: TypingPatternState::new(),
            chat_pattern: TypingPatternState::new(),
            draft_cadence: CadenceTracker::new(),
            chat_cadence: CadenceTracker::new(),
            last_scroll_ms: [None, None],
            last_feedback_draft: None,
            start_ms: now_ms,
            frozen_seconds: None,
            submitted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn counters(&self) -> &InteractionCounters {
        &self.counters
    }

    pub fn corpus(&self) -> &AiCorpus {
        &self.corpus
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    // -------------------------------------------------------------------------
    // Event gate
    // -------------------------------------------------------------------------

    /// Count a scroll event, rate-limited per panel to bound event storms.
    /// Returns whether the event was counted.
    pub fn record_scroll(&mut self, panel: Panel, now_ms: i64) -> bool {
        if self.submitted {
            return false;
        }
        let slot = panel as usize;
        if let Some(last) = self.last_scroll_ms[slot] {
            if now_ms.saturating_sub(last) < self.scroll_throttle_ms {
                return false;
            }
        }
        self.last_scroll_ms[slot] = Some(now_ms);
        match panel {
            Panel::Situation => self.counters.situation_scroll += 1,
            Panel::Chat => self.counters.chat_scroll += 1,
        }
        true
    }

    /// Gate a raw input event on a tracked field.
    ///
    /// The pattern state and cadence tracker advance on every event; the
    /// typing counter moves only when the classifier accepts it. Events
    /// after submission are ignored entirely.
    pub fn record_keystroke(
        &mut self,
        field: Field,
        value: &str,
        now_ms: i64,
    ) -> Result<(), RejectReason> {
        if self.submitted {
            return Ok(());
        }
        let (pattern, cadence) = match field {
            Field::ResponseDraft => (&mut self.draft_pattern, &mut self.draft_cadence),
            Field::ChatInput => (&mut self.chat_pattern, &mut self.chat_cadence),
        };
        let verdict = classify(value, pattern, now_ms, &self.rules);
        record(pattern, value, now_ms, &self.rules);
        cadence.record(now_ms);

        match verdict {
            Ok(()) => match field {
                Field::ResponseDraft => self.counters.response_typing += 1,
                Field::ChatInput => self.counters.chat_typing += 1,
            },
            Err(reason) => log::debug!("keystroke rejected on {field:?}: {reason}"),
        }
        verdict
    }

    /// Append an AI response to the provenance corpus in arrival order.
    pub fn push_ai_text(&mut self, text: impl Into<String>) {
        if self.submitted {
            return;
        }
        self.corpus.push(text);
    }

    /// Count a relevance-approved prompt dispatch.
    pub fn note_prompt_counted(&mut self) {
        if !self.submitted {
            self.counters.ai_prompts += 1;
        }
    }

    /// Count a dispatched feedback request and remember the draft it was
    /// issued against, for the next change-percentage gate.
    pub fn note_feedback_counted(&mut self, draft: &str) {
        if self.submitted {
            return;
        }
        self.counters.ai_feedback += 1;
        self.last_feedback_draft = Some(draft.to_string());
    }

    /// Policy gate for feedback requests: the draft must be long enough and
    /// must have changed materially since the previous request. The first
    /// request has no previous draft and is allowed unconditionally past
    /// the change check.
    pub fn check_feedback_gate(&self, draft: &str) -> Result<(), FeedbackRejection> {
        let words = draft.split_whitespace().count();
        if words <= self.feedback_min_words {
            return Err(FeedbackRejection::DraftTooShort {
                words,
                required: self.feedback_min_words + 1,
            });
        }
        if let Some(previous) = &self.last_feedback_draft {
            let change = 100u32.saturating_sub(similarity(draft, previous));
            if change < self.feedback_min_change_pct {
                return Err(FeedbackRejection::InsufficientChange {
                    change_pct: change,
                    required: self.feedback_min_change_pct,
                });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Derived metrics
    // -------------------------------------------------------------------------

    /// Wall-clock seconds since session start, frozen at submission.
    pub fn elapsed_seconds(&self, now_ms: i64) -> f64 {
        self.frozen_seconds
            .unwrap_or_else(|| now_ms.saturating_sub(self.start_ms) as f64 / 1000.0)
    }

    /// Current AI-attributed share of the draft. Expensive; debounce.
    pub fn ai_share(&self, draft: &str) -> u32 {
        estimate_ai_share(draft, &self.corpus, self.min_match_len)
    }

    /// Current Human Effort Score for the given draft.
    pub fn hes(&self, draft: &str, now_ms: i64) -> u64 {
        compute_hes(
            &self.counters,
            self.elapsed_seconds(now_ms),
            self.ai_share(draft),
            &self.weights,
        )
    }

    /// Per-term contributions backing [`Self::hes`].
    pub fn breakdown(&self, draft: &str, now_ms: i64) -> HesBreakdown {
        HesBreakdown::compute(
            &self.counters,
            self.elapsed_seconds(now_ms),
            self.ai_share(draft),
            &self.weights,
        )
    }

    pub fn cadence_summary(&self, field: Field) -> CadenceSummary {
        match field {
            Field::ResponseDraft => self.draft_cadence.summary(),
            Field::ChatInput => self.chat_cadence.summary(),
        }
    }

    /// Freeze the clock and close the session to further events. Terminal;
    /// driven by the submission coordinator.
    pub fn finalize(&mut self, now_ms: i64) {
        if self.submitted {
            return;
        }
        self.frozen_seconds = Some(self.elapsed_seconds(now_ms));
        self.submitted = true;
    }
}
