//! Draft provenance tracking.
//!
//! Estimates what fraction of the user's draft is traceable to text the
//! assistant produced during the session. Every AI response surfaced to the
//! user is appended to an ordered corpus; the tracker then marks draft
//! character offsets that appear verbatim inside any corpus entry and
//! reports the attributed fraction as a percentage.
//!
//! The sliding-window match is quadratic-to-cubic in text length per corpus
//! entry. Callers are expected to debounce invocation (see
//! [`crate::schedule`]) rather than recompute on every keystroke.

use serde::{Deserialize, Serialize};

use crate::similarity::normalize;

/// Default shortest segment considered a meaningful match, in characters.
///
/// Shorter shared runs ("thank you", common words) say nothing about
/// copying. The floor is a heuristic and stays configurable.
pub const DEFAULT_MIN_MATCH_LEN: usize = 10;

/// Ordered, append-only record of every AI text surfaced to the user.
///
/// Entries are never deduplicated or pruned; the corpus lives for the
/// session. Append order matters only for reporting; the attribution
/// result is an offset-set union and is order-independent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiCorpus {
    texts: Vec<String>,
}

impl AiCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response in arrival order.
    pub fn push(&mut self, text: impl Into<String>) {
        self.texts.push(text.into());
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }
}

/// Estimated share of draft characters attributable to AI output, as an
/// integer percentage in [0, 100].
///
/// Returns 0 for an empty/whitespace-only draft or an empty corpus. Both
/// sides are normalized the same way as [`crate::similarity::similarity`];
/// `min_match_len` is the shortest segment counted as a match.
pub fn estimate_ai_share(draft: &str, corpus: &AiCorpus, min_match_len: usize) -> u32 {
    let draft = normalize(draft);
    if draft.is_empty() || corpus.is_empty() {
        return 0;
    }

    let draft_chars: Vec<char> = draft.chars().collect();
    let len = draft_chars.len();
    let mut attributed = vec![false; len];
    let floor = min_match_len.max(1);

    for ai_text in corpus.texts() {
        let ai = normalize(ai_text);
        if ai.is_empty() {
            continue;
        }
        let ai_chars: Vec<char> = ai.chars().collect();

        // Whole-text containment short-circuits.
        if ai_chars.len() >= len && find_slice(&ai_chars, &draft_chars).is_some() {
            attributed.iter_mut().for_each(|a| *a = true);
            break;
        }
        if let Some(start) = find_slice(&draft_chars, &ai_chars) {
            mark(&mut attributed, start, ai_chars.len());
        }

        // Longest-first sliding windows; union over offsets dedups overlaps.
        let max_window = len.min(ai_chars.len());
        for window in (floor..=max_window).rev() {
            for start in 0..=(len - window) {
                if attributed[start..start + window].iter().all(|&a| a) {
                    continue;
                }
                if find_slice(&ai_chars, &draft_chars[start..start + window]).is_some() {
                    mark(&mut attributed, start, window);
                }
            }
        }
    }

    let matched = attributed.iter().filter(|&&a| a).count();
    let pct = (100.0 * matched as f64 / len as f64).round() as u32;
    pct.min(100)
}

fn mark(attributed: &mut [bool], start: usize, window: usize) {
    for slot in attributed.iter_mut().skip(start).take(window) {
        *slot = true;
    }
}

/// First occurrence of `needle` inside `haystack`, by code point.
fn find_slice(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> AiCorpus {
        let mut c = AiCorpus::new();
        for t in texts {
            c.push(*t);
        }
        c
    }

    #[test]
    fn test_empty_corpus_scores_0() {
        let c = AiCorpus::new();
        assert_eq!(estimate_ai_share("a perfectly fine draft", &c, DEFAULT_MIN_MATCH_LEN), 0);
    }

    #[test]
    fn test_empty_draft_scores_0() {
        let c = corpus(&["some assistant reply"]);
        assert_eq!(estimate_ai_share("", &c, DEFAULT_MIN_MATCH_LEN), 0);
        assert_eq!(estimate_ai_share("   \n\t ", &c, DEFAULT_MIN_MATCH_LEN), 0);
    }

    #[test]
    fn test_full_copy_scores_100() {
        let text = "you should talk to your roommate directly about the noise";
        let c = corpus(&[text]);
        assert_eq!(estimate_ai_share(text, &c, DEFAULT_MIN_MATCH_LEN), 100);
    }

    #[test]
    fn test_draft_containing_whole_ai_text() {
        let ai = "set clear boundaries early";
        let draft = format!("my own opening thoughts here. {ai}. and my own closing words");
        let c = corpus(&[ai]);
        let share = estimate_ai_share(&draft, &c, DEFAULT_MIN_MATCH_LEN);
        assert!(share > 0 && share < 100, "got {share}");
    }

    #[test]
    fn test_unrelated_draft_scores_0() {
        let c = corpus(&["consider writing a polite note first"]);
        let share = estimate_ai_share(
            "zebras gallop underneath quixotic moonbeams",
            &c,
            DEFAULT_MIN_MATCH_LEN,
        );
        assert_eq!(share, 0);
    }

    #[test]
    fn test_short_shared_runs_below_floor_ignored() {
        // Only overlap is "the" and single spaces, far below the floor.
        let c = corpus(&["the assistant wrote about the weather"]);
        assert_eq!(
            estimate_ai_share("the user typed about music", &c, DEFAULT_MIN_MATCH_LEN),
            0
        );
    }

    #[test]
    fn test_overlapping_matches_from_multiple_texts_do_not_double_count() {
        let draft = "please apologize to your neighbor today";
        let c = corpus(&[draft, draft]);
        assert_eq!(estimate_ai_share(draft, &c, DEFAULT_MIN_MATCH_LEN), 100);
    }

    #[test]
    fn test_normalization_is_shared_with_similarity() {
        let c = corpus(&["Try  A Calm   Conversation First Tonight"]);
        assert_eq!(
            estimate_ai_share("try a calm conversation first tonight", &c, DEFAULT_MIN_MATCH_LEN),
            100
        );
    }

    #[test]
    fn test_floor_is_configurable() {
        let c = corpus(&["abcdef"]);
        // With a floor of 3 the shared 6-char run counts even in a short draft.
        let share = estimate_ai_share("abcdef xyzqrs", &c, 3);
        assert!(share >= 40, "got {share}");
    }
}
