//! Human Effort Score computation.
//!
//! Keeps the raw interaction counters and applies the configurable
//! weighted-sum model that combines them with time-on-page and the
//! AI-share penalty into a single non-negative integer score.

use serde::{Deserialize, Serialize};

/// Raw interaction counts for one session.
///
/// Mutated only by the session event gate; every field is monotonically
/// non-decreasing. Time-on-page is not stored here; it is recomputed from
/// the session start timestamp, not accumulated by events.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCounters {
    pub situation_scroll: u64,
    pub chat_scroll: u64,
    pub response_typing: u64,
    pub chat_typing: u64,
    pub ai_prompts: u64,
    pub ai_feedback: u64,
}

impl InteractionCounters {
    pub fn total(&self) -> u64 {
        self.situation_scroll
            + self.chat_scroll
            + self.response_typing
            + self.chat_typing
            + self.ai_prompts
            + self.ai_feedback
    }
}

/// Signed weights of the linear scoring model.
///
/// `draft_similarity` must be negative (copying is penalized); every
/// interaction weight and `time_on_page` must be non-negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTable {
    pub situation_scroll: f64,
    pub chat_scroll: f64,
    pub response_typing: f64,
    pub chat_typing: f64,
    pub ai_prompts: f64,
    pub ai_feedback: f64,
    pub time_on_page: f64,
    pub draft_similarity: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            situation_scroll: 0.5,
            chat_scroll: 0.5,
            response_typing: 2.0,
            chat_typing: 1.0,
            ai_prompts: 5.0,
            ai_feedback: 5.0,
            time_on_page: 0.5,
            draft_similarity: -1.0,
        }
    }
}

impl WeightTable {
    /// Enforce the sign invariants of the model.
    pub fn validate(&self) -> Result<(), WeightError> {
        if self.draft_similarity >= 0.0 {
            return Err(WeightError::SimilarityNotNegative(self.draft_similarity));
        }
        for (name, value) in [
            ("situationScroll", self.situation_scroll),
            ("chatScroll", self.chat_scroll),
            ("responseTyping", self.response_typing),
            ("chatTyping", self.chat_typing),
            ("aiPrompts", self.ai_prompts),
            ("aiFeedback", self.ai_feedback),
            ("timeOnPage", self.time_on_page),
        ] {
            if value < 0.0 {
                return Err(WeightError::NegativeInteractionWeight {
                    metric: name,
                    value,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("weights: draftSimilarity must be negative, got {0}")]
    SimilarityNotNegative(f64),
    #[error("weights: {metric} must be non-negative, got {value}")]
    NegativeInteractionWeight { metric: &'static str, value: f64 },
}

/// Per-term contributions, kept alongside the score in the report so the
/// number can be audited after the fact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HesBreakdown {
    pub situation_scroll: f64,
    pub chat_scroll: f64,
    pub response_typing: f64,
    pub chat_typing: f64,
    pub ai_prompts: f64,
    pub ai_feedback: f64,
    pub time_on_page: f64,
    pub draft_similarity: f64,
}

impl HesBreakdown {
    pub fn compute(
        counters: &InteractionCounters,
        time_on_page_seconds: f64,
        ai_share_pct: u32,
        weights: &WeightTable,
    ) -> Self {
        Self {
            situation_scroll: counters.situation_scroll as f64 * weights.situation_scroll,
            chat_scroll: counters.chat_scroll as f64 * weights.chat_scroll,
            response_typing: counters.response_typing as f64 * weights.response_typing,
            chat_typing: counters.chat_typing as f64 * weights.chat_typing,
            ai_prompts: counters.ai_prompts as f64 * weights.ai_prompts,
            ai_feedback: counters.ai_feedback as f64 * weights.ai_feedback,
            time_on_page: time_on_page_seconds * weights.time_on_page,
            draft_similarity: ai_share_pct as f64 * weights.draft_similarity,
        }
    }

    pub fn sum(&self) -> f64 {
        self.situation_scroll
            + self.chat_scroll
            + self.response_typing
            + self.chat_typing
            + self.ai_prompts
            + self.ai_feedback
            + self.time_on_page
            + self.draft_similarity
    }
}

/// The weighted-sum Human Effort Score, floored at zero.
pub fn compute_hes(
    counters: &InteractionCounters,
    time_on_page_seconds: f64,
    ai_share_pct: u32,
    weights: &WeightTable,
) -> u64 {
    let total = HesBreakdown::compute(counters, time_on_page_seconds, ai_share_pct, weights).sum();
    total.round().max(0.0) as u64
}
