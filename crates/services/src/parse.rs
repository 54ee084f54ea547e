//! Defensive parsing of completion-provider output.
//!
//! Provider text is untrusted: every function here is total, returning a
//! typed value or `None`/an empty collection, never an error. Callers decide
//! the fallback.

use serde::Deserialize;

use tutor_core::model::Question;
use tutor_core::overlap;

/// Parse a relevance judgment in the `SCORE:` / `REASONING:` line format.
///
/// The score is clamped to 1..=5. Returns `None` when no score line is
/// present; the reasoning defaults to an empty string when its line is
/// missing.
#[must_use]
pub fn relevance(text: &str) -> Option<(u8, String)> {
    let mut score: Option<u8> = None;
    let mut reasoning = String::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = strip_label(line, "SCORE") {
            if score.is_none() {
                score = leading_number(rest).map(|n| n.round().clamp(1.0, 5.0) as u8);
            }
        } else if let Some(rest) = strip_label(line, "REASONING") {
            if reasoning.is_empty() {
                reasoning = rest.trim().to_string();
            }
        }
    }

    score.map(|s| (s, reasoning))
}

/// Parse generated questions in the numbered block format:
///
/// ```text
/// QUESTION 1 (MCQ)
/// Which keyword moves ownership?
/// A) let
/// B) move
/// C) borrow
/// CORRECT: B
///
/// QUESTION 2 (OPEN)
/// Explain borrowing in your own words.
/// ```
///
/// Malformed blocks are dropped rather than failing the whole set. Each
/// surviving question is mapped to the objective with the highest keyword
/// overlap (index 0 when nothing matches).
#[must_use]
pub fn questions(text: &str, objectives: &[String]) -> Vec<Question> {
    let mut parsed = Vec::new();

    for block in split_question_blocks(text) {
        if let Some(question) = parse_block(&block, objectives) {
            parsed.push(question);
        }
    }

    parsed
}

/// Parse a grading judgment: the first JSON object in the text with a
/// numeric `score` and optional string `feedback`.
///
/// Scores in [0, 1] are treated as fractions and rescaled to [0, 100];
/// anything else is clamped into [0, 100] directly.
#[must_use]
pub fn grade(text: &str) -> Option<(f64, String)> {
    let object = first_json_object(text)?;
    let body: GradeBody = serde_json::from_str(&object).ok()?;
    let raw = body.score?;
    if !raw.is_finite() {
        return None;
    }
    let score = if (0.0..=1.0).contains(&raw) {
        raw * 100.0
    } else {
        raw.clamp(0.0, 100.0)
    };
    Some((score, body.feedback.unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct GradeBody {
    score: Option<f64>,
    feedback: Option<String>,
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let trimmed = line.trim_start_matches(['*', '#', '-', ' ']);
    if trimmed.len() < label.len() + 1 || !trimmed.is_char_boundary(label.len()) {
        return None;
    }
    let (head, rest) = trimmed.split_at(label.len());
    if head.eq_ignore_ascii_case(label) {
        rest.strip_prefix(':')
    } else {
        None
    }
}

fn leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

fn split_question_blocks(text: &str) -> Vec<Vec<String>> {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("QUESTION ") || upper == "QUESTION" {
            blocks.push(vec![line.to_string()]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line.to_string());
        }
    }
    blocks
}

fn parse_block(block: &[String], objectives: &[String]) -> Option<Question> {
    let header = block.first()?;
    let is_mcq = header.to_ascii_uppercase().contains("MCQ");

    let mut text = String::new();
    let mut options: Vec<String> = Vec::new();
    let mut correct: Option<String> = None;

    for line in &block[1..] {
        if let Some(rest) = strip_label(line, "CORRECT") {
            correct = Some(rest.trim().to_string());
        } else if let Some(option) = option_text(line) {
            options.push(option);
        } else if text.is_empty() {
            text = line.clone();
        }
    }

    if text.is_empty() {
        return None;
    }
    let objective_ref = overlap::best_match(&text, objectives).unwrap_or(0);

    if is_mcq {
        let key = correct?;
        // A single letter names an option by position.
        let correct_text = if key.len() == 1 {
            let byte = key.to_ascii_uppercase().bytes().next()?;
            let index = byte.checked_sub(b'A')? as usize;
            options.get(index)?.clone()
        } else {
            key
        };
        Question::objective(text, options, correct_text, objective_ref).ok()
    } else {
        Question::open_ended(text, objective_ref).ok()
    }
}

fn option_text(line: &str) -> Option<String> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !('A'..='D').contains(&letter.to_ascii_uppercase()) {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest.strip_prefix(')').or_else(|| rest.strip_prefix('.'))?;
    let option = rest.trim();
    if option.is_empty() {
        None
    } else {
        Some(option.to_string())
    }
}

fn first_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
