//! # Matcher Module
//!
//! Finds the stored question that corresponds to a user's free-text question.
//!
//! Exact matching compares trimmed, whitespace-collapsed text and is case
//! sensitive. Fuzzy matching scores every document with a normalized
//! Levenshtein ratio over lowercased text and keeps those at or above the
//! threshold, best first. The full ranked list is returned; trimming it for
//! display is the caller's business.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::config::DEFAULT_SIMILARITY_THRESHOLD;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A scraped question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub question: String,
    pub answer: String,
}

impl Document {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A fuzzy match and its score in `0.0..=1.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub document: Document,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub exact: Option<Document>,
    pub similar: Vec<Candidate>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.exact.is_none() && self.similar.is_empty()
    }
}

/// Trim and collapse runs of whitespace into single spaces
pub fn normalize_question(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Levenshtein distance over chars
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity of two questions in `0.0..=1.0`, case-insensitive
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize_question(a).to_lowercase().chars().collect();
    let b: Vec<char> = normalize_question(b).to_lowercase().chars().collect();

    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn match_question(&self, question: &str, documents: &[Document]) -> MatchResult {
        let wanted = normalize_question(question);

        if let Some(exact) = documents
            .iter()
            .find(|doc| normalize_question(&doc.question) == wanted)
        {
            debug!(question = %wanted, "Exact match found");
            return MatchResult {
                exact: Some(exact.clone()),
                similar: Vec::new(),
            };
        }

        let mut similar: Vec<Candidate> = documents
            .iter()
            .map(|doc| Candidate {
                score: similarity(&wanted, &doc.question),
                document: doc.clone(),
            })
            .filter(|candidate| candidate.score >= self.threshold)
            .collect();

        // Stable sort keeps source order among equal scores
        similar.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        debug!(
            question = %wanted,
            documents = documents.len(),
            candidates = similar.len(),
            "Fuzzy matching completed"
        );

        MatchResult {
            exact: None,
            similar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(questions: &[&str]) -> Vec<Document> {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| Document::new(*q, format!("answer {i}")))
            .collect()
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("Hello", "hello"), 1.0);
        assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(normalize_question("  What   is\n2+2? "), "What is 2+2?");
    }

    #[test]
    fn test_exact_match_beats_similar() {
        let documents = docs(&["What is 2+2 ?", "What is 2+2?", "What is 2+3?"]);
        let result = Matcher::default().match_question("What is 2+2?", &documents);

        assert_eq!(result.exact, Some(documents[1].clone()));
        assert!(result.similar.is_empty());
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let documents = docs(&["what is 2+2?"]);
        let result = Matcher::default().match_question("What is 2+2?", &documents);

        assert_eq!(result.exact, None);
        assert_eq!(result.similar.len(), 1);
        assert_eq!(result.similar[0].score, 1.0);
    }

    #[test]
    fn test_first_exact_match_wins() {
        let documents = vec![
            Document::new("Define force.", "first"),
            Document::new("Define force.", "second"),
        ];
        let result = Matcher::default().match_question("Define force.", &documents);

        assert_eq!(result.exact.map(|d| d.answer), Some("first".to_string()));
    }

    #[test]
    fn test_similar_ranked_descending_with_stable_ties() {
        let documents = docs(&[
            "What is the speed of light?",
            "What is the speed of sound?",
            "What is the speed of lite?",
            "What is the speed of lite?",
            "Name the noble gases.",
        ]);
        let result = Matcher::default().match_question("What is the speed of light", &documents);

        assert_eq!(result.exact, None);
        let answers: Vec<&str> = result
            .similar
            .iter()
            .map(|c| c.document.answer.as_str())
            .collect();
        assert_eq!(answers[0], "answer 0");
        assert!(!answers.contains(&"answer 4"));

        let tie_first = answers.iter().position(|a| *a == "answer 2").unwrap();
        let tie_second = answers.iter().position(|a| *a == "answer 3").unwrap();
        assert_eq!(tie_second, tie_first + 1);

        assert!(result
            .similar
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn test_nothing_above_threshold() {
        let documents = docs(&["Balance this equation.", "State Ohm's law."]);
        let result = Matcher::default().match_question("What is 2+2?", &documents);

        assert_eq!(result, MatchResult::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_documents() {
        let result = Matcher::default().match_question("Anything?", &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_matcher_returns_full_ranked_list() {
        let questions: Vec<String> = (0..8).map(|i| format!("Calculate the mass {i}")).collect();
        let refs: Vec<&str> = questions.iter().map(String::as_str).collect();
        let result = Matcher::default().match_question("Calculate the mass", &docs(&refs));

        assert_eq!(result.similar.len(), 8);
    }
}
