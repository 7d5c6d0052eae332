//! Typing-pattern validity classification.
//!
//! Decides whether a raw input event on a tracked field reflects genuine
//! authorship effort or spam/gaming (held-down keys, pasted-looking repeats,
//! back-and-forth edits that never progress). Classification is pure; the
//! pattern state is advanced by a separate [`record`] call that runs on
//! every event regardless of the verdict, so sustained gaming attempts keep
//! feeding the detector.
//!
//! A small cadence tracker also accumulates inter-key intervals per field
//! for the final report, in the spirit of keystroke cadence analysis.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Bounded history depth per tracked field.
pub const HISTORY_LEN: usize = 10;

/// Same word repeated this many times consecutively is spam.
const WORD_REPEAT_LIMIT: usize = 3;

/// Short-sequence rule: sequence lengths tried, occurrences required and
/// the largest gap (in characters) allowed between occurrences.
const SEQ_LEN_MIN: usize = 2;
const SEQ_LEN_MAX: usize = 6;
const SEQ_REPEAT_LIMIT: usize = 3;
const SEQ_GAP_MAX: usize = 2;

/// Leading character-pattern rule: pattern lengths tried and contiguous
/// repeats required.
const PATTERN_LEN_MIN: usize = 2;
const PATTERN_LEN_MAX: usize = 4;
const PATTERN_REPEAT_LIMIT: usize = 3;

/// Oscillation rule: window of history lengths examined, maximum distinct
/// values and maximum max-min spread for the window to count as churn.
const OSCILLATION_WINDOW: usize = 6;
const OSCILLATION_DISTINCT_MAX: usize = 3;
const OSCILLATION_SPREAD_MAX: usize = 5;

/// Coefficient-of-variation threshold below which cadence looks robotic.
const ROBOTIC_CV_THRESHOLD: f64 = 0.15;

/// Minimum intervals before the robotic flag is meaningful.
const ROBOTIC_MIN_SAMPLES: usize = 10;

// =============================================================================
// Rules & state
// =============================================================================

/// Tunable knobs for the rapid-repeat rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingRules {
    /// Two appends of the same character closer than this are "rapid".
    #[serde(default = "default_rapid_repeat_ms")]
    pub rapid_repeat_ms: i64,
    /// Consecutive rapid same-character appends tolerated before rejection.
    #[serde(default = "default_rapid_repeat_limit")]
    pub rapid_repeat_limit: u32,
}

fn default_rapid_repeat_ms() -> i64 {
    100
}
fn default_rapid_repeat_limit() -> u32 {
    5
}

impl Default for TypingRules {
    fn default() -> Self {
        Self {
            rapid_repeat_ms: default_rapid_repeat_ms(),
            rapid_repeat_limit: default_rapid_repeat_limit(),
        }
    }
}

/// One history sample per raw input event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySample {
    pub length: usize,
    pub time_ms: i64,
    pub value: String,
}

/// Per-field pattern state, advanced on every raw input event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypingPatternState {
    previous_value: String,
    previous_length: usize,
    last_change_ms: i64,
    last_char: Option<char>,
    repeat_count: u32,
    history: VecDeque<HistorySample>,
}

impl TypingPatternState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_length(&self) -> usize {
        self.previous_length
    }

    pub fn history(&self) -> impl Iterator<Item = &HistorySample> {
        self.history.iter()
    }
}

/// Why an input event was excluded from effort scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Field length decreased; deletions never count as effort.
    Deletion,
    /// Same character appended in a rapid burst (held-down key).
    RapidRepeat,
    /// Same word typed three or more times in a row.
    WordRepeat,
    /// Short sequence stamped repeatedly at word boundaries.
    SequenceRepeat,
    /// Leading character pattern repeated contiguously.
    PatternRepeat,
    /// Field length oscillating without making progress.
    Oscillation,
}

impl RejectReason {
    /// User-facing warning text. The adapter shows at most one warning at a
    /// time, replacing any still on screen.
    pub fn warning(&self) -> &'static str {
        match self {
            RejectReason::Deletion => "Deletions are not counted toward your effort score.",
            RejectReason::RapidRepeat => {
                "Holding down a key does not count toward your effort score."
            }
            RejectReason::WordRepeat => "Repeating the same word is not counted as writing.",
            RejectReason::SequenceRepeat | RejectReason::PatternRepeat => {
                "Repetitive text is not counted toward your effort score."
            }
            RejectReason::Oscillation => {
                "Typing and deleting the same text is not counted as writing."
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Deletion => write!(f, "deletion"),
            RejectReason::RapidRepeat => write!(f, "rapid_repeat"),
            RejectReason::WordRepeat => write!(f, "word_repeat"),
            RejectReason::SequenceRepeat => write!(f, "sequence_repeat"),
            RejectReason::PatternRepeat => write!(f, "pattern_repeat"),
            RejectReason::Oscillation => write!(f, "oscillation"),
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Judge a raw input event against the current pattern state.
///
/// Rules are evaluated in a fixed order; the first match rejects the event.
/// The state is not touched here; call [`record`] afterwards, valid or not.
pub fn classify(
    value: &str,
    state: &TypingPatternState,
    now_ms: i64,
    rules: &TypingRules,
) -> Result<(), RejectReason> {
    let chars: Vec<char> = value.chars().collect();

    if chars.len() < state.previous_length {
        return Err(RejectReason::Deletion);
    }

    if rapid_repeat_candidate(state, &chars, now_ms, rules) >= rules.rapid_repeat_limit {
        return Err(RejectReason::RapidRepeat);
    }

    if has_consecutive_word_repeat(value) {
        return Err(RejectReason::WordRepeat);
    }

    if has_repeated_short_sequence(&chars) {
        return Err(RejectReason::SequenceRepeat);
    }

    if has_leading_pattern_repeat(&chars) {
        return Err(RejectReason::PatternRepeat);
    }

    if is_oscillating(state) {
        return Err(RejectReason::Oscillation);
    }

    Ok(())
}

/// Advance the pattern state with this event. Runs on every raw event,
/// including rejected ones.
pub fn record(state: &mut TypingPatternState, value: &str, now_ms: i64, rules: &TypingRules) {
    let chars: Vec<char> = value.chars().collect();

    state.repeat_count = rapid_repeat_candidate(state, &chars, now_ms, rules);
    state.last_char = chars.last().copied();
    state.previous_value = value.to_string();
    state.previous_length = chars.len();
    state.last_change_ms = now_ms;

    state.history.push_back(HistorySample {
        length: chars.len(),
        time_ms: now_ms,
        value: value.to_string(),
    });
    while state.history.len() > HISTORY_LEN {
        state.history.pop_front();
    }
}

/// Consecutive rapid same-character appends, counting this event.
///
/// Resets to 1 when a different character is appended (or the burst slows
/// down) and to 0 when the event is not an append at all.
fn rapid_repeat_candidate(
    state: &TypingPatternState,
    chars: &[char],
    now_ms: i64,
    rules: &TypingRules,
) -> u32 {
    if chars.len() <= state.previous_length {
        return 0;
    }
    let Some(&appended) = chars.last() else {
        return 0;
    };
    if state.last_char == Some(appended)
        && now_ms.saturating_sub(state.last_change_ms) < rules.rapid_repeat_ms
    {
        state.repeat_count + 1
    } else {
        1
    }
}

fn has_consecutive_word_repeat(value: &str) -> bool {
    let mut run = 0usize;
    let mut previous: Option<&str> = None;
    for word in value.split_whitespace() {
        if previous == Some(word) {
            run += 1;
        } else {
            run = 1;
            previous = Some(word);
        }
        if run >= WORD_REPEAT_LIMIT {
            return true;
        }
    }
    false
}

/// Sequences of length 2-6 anchored at word-ish boundaries (start of the
/// value or just after a space): three consecutive identical extractions
/// with gaps of at most two characters between them is stamping, not typing.
fn has_repeated_short_sequence(chars: &[char]) -> bool {
    for seq_len in SEQ_LEN_MIN..=SEQ_LEN_MAX {
        if chars.len() < seq_len * SEQ_REPEAT_LIMIT {
            continue;
        }

        let anchored: Vec<(usize, &[char])> = (0..=chars.len() - seq_len)
            .filter(|&pos| pos == 0 || chars[pos - 1] == ' ')
            .map(|pos| (pos, &chars[pos..pos + seq_len]))
            .collect();

        for window in anchored.windows(SEQ_REPEAT_LIMIT) {
            let all_equal = window.windows(2).all(|pair| pair[0].1 == pair[1].1);
            if !all_equal {
                continue;
            }
            let gaps_small = window.windows(2).all(|pair| {
                let end = pair[0].0 + seq_len;
                pair[1].0 >= end && pair[1].0 - end <= SEQ_GAP_MAX
            });
            if gaps_small {
                return true;
            }
        }
    }
    false
}

/// The pattern formed by the first 2-4 characters repeated contiguously
/// three or more times ("ababab", "abcabcabc").
fn has_leading_pattern_repeat(chars: &[char]) -> bool {
    for pat_len in PATTERN_LEN_MIN..=PATTERN_LEN_MAX {
        if chars.len() < pat_len * PATTERN_REPEAT_LIMIT {
            continue;
        }
        let pattern = &chars[..pat_len];
        let repeats = chars
            .chunks(pat_len)
            .take_while(|chunk| *chunk == pattern)
            .count();
        if repeats >= PATTERN_REPEAT_LIMIT {
            return true;
        }
    }
    false
}

/// The last six history lengths taking on at most three distinct values
/// inside a spread of five characters means the user is churning in place.
fn is_oscillating(state: &TypingPatternState) -> bool {
    if state.history.len() < OSCILLATION_WINDOW {
        return false;
    }
    let lengths: Vec<usize> = state
        .history
        .iter()
        .rev()
        .take(OSCILLATION_WINDOW)
        .map(|s| s.length)
        .collect();

    let mut distinct = lengths.clone();
    distinct.sort_unstable();
    distinct.dedup();

    let min = *lengths.iter().min().unwrap_or(&0);
    let max = *lengths.iter().max().unwrap_or(&0);

    distinct.len() <= OSCILLATION_DISTINCT_MAX && max - min <= OSCILLATION_SPREAD_MAX
}

// =============================================================================
// Cadence tracking
// =============================================================================

/// Accumulates inter-key intervals for one field.
#[derive(Debug, Clone, Default)]
pub struct CadenceTracker {
    last_event_ms: Option<i64>,
    intervals_ms: Vec<f64>,
}

impl CadenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now_ms: i64) {
        if let Some(last) = self.last_event_ms {
            let dt = (now_ms - last) as f64;
            // Filter extreme values the same way long pauses are excluded
            // from inter-key statistics.
            if dt > 0.0 && dt < 10_000.0 {
                self.intervals_ms.push(dt);
            }
        }
        self.last_event_ms = Some(now_ms);
    }

    pub fn summary(&self) -> CadenceSummary {
        if self.intervals_ms.is_empty() {
            return CadenceSummary::default();
        }
        let mean = self.intervals_ms.clone().mean();
        let std_dev = self.intervals_ms.clone().std_dev();
        let cv = if mean > 0.0 { std_dev / mean } else { 0.0 };

        CadenceSummary {
            sample_count: self.intervals_ms.len(),
            mean_iki_ms: mean,
            std_dev_iki_ms: std_dev,
            coefficient_of_variation: cv,
            is_robotic: self.intervals_ms.len() >= ROBOTIC_MIN_SAMPLES
                && cv < ROBOTIC_CV_THRESHOLD,
        }
    }
}

/// Inter-key interval statistics for one field, included in the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadenceSummary {
    pub sample_count: usize,
    pub mean_iki_ms: f64,
    pub std_dev_iki_ms: f64,
    pub coefficient_of_variation: f64,
    /// Suspiciously even cadence, suggesting synthetic input.
    pub is_robotic: bool,
}

// =============================================================================
// Tests
// =============================================================================
