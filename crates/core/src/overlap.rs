//! Lexical keyword-overlap scoring.
//!
//! A cheap, deterministic relevance signal shared by the relevance validator
//! and the answer grader. Tokens shorter than four characters are ignored to
//! keep stop words out of the signal.

use std::collections::BTreeSet;

const MIN_TOKEN_LEN: usize = 4;

/// Lowercased alphanumeric tokens of at least four characters.
#[must_use]
pub fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of the reference vocabulary present in `candidate`, in `[0, 1]`.
///
/// The reference vocabulary is the union of tokens across all reference
/// texts; an empty vocabulary scores `0.0`.
#[must_use]
pub fn overlap_ratio(candidate: &str, references: &[String]) -> f64 {
    let mut reference_tokens = BTreeSet::new();
    for reference in references {
        reference_tokens.extend(tokens(reference));
    }
    if reference_tokens.is_empty() {
        return 0.0;
    }

    let candidate_tokens = tokens(candidate);
    let hits = reference_tokens
        .iter()
        .filter(|token| candidate_tokens.contains(*token))
        .count();
    hits as f64 / reference_tokens.len() as f64
}

/// Index of the reference text sharing the most tokens with `text`.
///
/// Ties resolve to the earliest reference; returns `None` when nothing
/// overlaps at all.
#[must_use]
pub fn best_match(text: &str, references: &[String]) -> Option<usize> {
    let text_tokens = tokens(text);
    let mut best: Option<(usize, usize)> = None;
    for (index, reference) in references.iter().enumerate() {
        let hits = tokens(reference)
            .iter()
            .filter(|token| text_tokens.contains(*token))
            .count();
        if hits > 0 && best.map_or(true, |(_, best_hits)| hits > best_hits) {
            best = Some((index, hits));
        }
    }
    best.map(|(index, _)| index)
}
