//! Deterministic, rule-based scoring of model output.
//!
//! Scoring is intentionally a cheap local heuristic rather than a second
//! model call, so a round never gains an extra remote dependency or failure
//! mode. Four axes are derived from the text alone:
//!
//! | Axis | Signal |
//! |------|--------|
//! | `accuracy` | lexical overlap with the prompt's significant words |
//! | `reasoning` | word count inside a "not too short, not too long" band |
//! | `structure` | sentence count plus paragraph breaks |
//! | `creativity` | category-specific cue words found in the text |
//!
//! Identical `(text, prompt, category)` inputs always produce an identical
//! [`Score`].

use crate::battle::records::Score;

/// Cue words that earn the creativity bonus, per category. Unrecognized
/// categories use the `general` row.
const CATEGORY_CUES: &[(&str, &[&str])] = &[
    (
        "general",
        &["example", "because", "consider", "practical"],
    ),
    (
        "creative",
        &["imagine", "story", "vivid", "character", "metaphor", "twist"],
    ),
    (
        "technical",
        &["code", "function", "example", "implementation", "error", "test"],
    ),
    (
        "analysis",
        &["however", "evidence", "compare", "tradeoff", "implication"],
    ),
    (
        "summary",
        &["in short", "overall", "key", "main", "briefly"],
    ),
    (
        "explanation",
        &["simply", "analogy", "example", "in other words", "think of"],
    ),
    (
        "math",
        &["therefore", "equals", "result", "step", "formula", "solve"],
    ),
    (
        "research",
        &["source", "study", "evidence", "literature", "finding"],
    ),
];

/// Words worth matching on: lowercased, stripped of surrounding punctuation,
/// at least four characters. Order of first appearance, no duplicates.
pub(crate) fn significant_words(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for raw in text.split_whitespace() {
        let word: String = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.len() >= 4 && !seen.contains(&word) {
            seen.push(word);
        }
    }
    seen
}

fn cues_for(category: &str) -> &'static [&'static str] {
    let wanted = category.trim().to_lowercase();
    CATEGORY_CUES
        .iter()
        .find(|(name, _)| *name == wanted)
        .or_else(|| CATEGORY_CUES.iter().find(|(name, _)| *name == "general"))
        .map(|(_, cues)| *cues)
        .unwrap_or(&[])
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Scores one response against its originating prompt and category.
#[derive(Debug, Default)]
pub struct ResponseScorer;

impl ResponseScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, text: &str, prompt: &str, category: &str) -> Score {
        if text.trim().is_empty() {
            return Score::from_axes(1.0, 1.0, 1.0, 1.0, "empty response text");
        }

        let lower = text.to_lowercase();
        let response_words = significant_words(text);
        let prompt_words = significant_words(prompt);

        // Lexical overlap with the prompt, capped by construction at a full
        // match. An empty prompt gives the neutral midpoint.
        let (hits, accuracy) = if prompt_words.is_empty() {
            (0, 5.5)
        } else {
            let hits = prompt_words
                .iter()
                .filter(|w| response_words.contains(w))
                .count();
            let ratio = hits as f64 / prompt_words.len() as f64;
            (hits, 3.0 + ratio * 7.0)
        };

        // Length adequacy. The sweet spot rewards substance without rambling.
        let words = text.split_whitespace().count();
        let reasoning = match words {
            0..=39 => 2.5 + words as f64 * 0.15,
            40..=79 => 8.5,
            80..=200 => 9.5,
            201..=300 => 8.5,
            _ => (8.5 - (words - 300) as f64 / 100.0).max(3.0),
        };

        // Sentence shape, with a paragraph-break bonus.
        let sentences = count_sentences(text);
        let mut structure = match sentences {
            0 => 3.0,
            1 => 5.0,
            2..=3 => 7.0,
            4..=12 => 9.0,
            _ => 7.5,
        };
        if text.contains("\n\n") {
            structure += 1.0;
        }

        // Category cue words, each distinct hit worth a fixed bonus.
        let cues = cues_for(category);
        let cue_hits = cues.iter().filter(|cue| lower.contains(**cue)).count();
        let creativity = 5.0 + (cue_hits as f64 * 1.25).min(5.0);

        let notes = format!(
            "{hits}/{} prompt keywords; {words} words; {sentences} sentences; \
             {cue_hits} category cues",
            prompt_words.len(),
        );
        Score::from_axes(accuracy, reasoning, structure, creativity, notes)
    }
}
