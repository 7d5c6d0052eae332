//! Normalized text similarity.
//!
//! Produces an integer percentage in [0, 100] describing how close two
//! pieces of text are after case folding and whitespace collapsing. Used by
//! the feedback gate (how much did the draft change since the last feedback
//! request) and by the provenance tracker's whole-text comparisons.
//!
//! All length arithmetic operates on Unicode scalar values so the result is
//! consistent with the offset bookkeeping in [`crate::provenance`].

/// Normalize text for comparison: lowercase, collapse whitespace runs to
/// single spaces, trim.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two texts as an integer percentage in [0, 100].
///
/// Fast paths: equal normalized strings score 100, an empty side scores 0,
/// and containment (copy/paste of one text into the other) is scored by
/// length ratio without running the full edit-distance computation.
pub fn similarity(a: &str, b: &str) -> u32 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return if a.is_empty() { 0 } else { 100 };
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();

    // Containment fast path: one string pasted inside the other.
    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        let shorter = len_a.min(len_b) as f64;
        let longer = len_a.max(len_b) as f64;
        return (100.0 * shorter / longer).round() as u32;
    }

    let distance = levenshtein(&a, &b);
    let max_len = len_a.max(len_b) as f64;
    let score = 100.0 * (1.0 - distance as f64 / max_len);
    score.round().max(0.0) as u32
}

/// Levenshtein edit distance over Unicode scalar values with unit costs.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row dynamic program keeps memory linear in the shorter text.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
