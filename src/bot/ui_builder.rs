//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::config::MAX_DISPLAYED_CANDIDATES;
use crate::ledger::Locale;
use crate::lookup::LookupOutcome;
use crate::matcher::Candidate;

const MAX_BUTTON_LABEL: usize = 48;

/// Decoded inline keyboard callback
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    Language(Locale),
    Subject(String),
    Level(String),
    Paper(String),
    Pick(usize),
}

/// Decode callback data produced by the keyboards below
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let (kind, value) = data.split_once(':')?;
    match kind {
        "lang" => match value {
            "en" => Some(CallbackAction::Language(Locale::En)),
            "fr" => Some(CallbackAction::Language(Locale::Fr)),
            _ => None,
        },
        "subject" => Some(CallbackAction::Subject(value.to_string())),
        "level" => Some(CallbackAction::Level(value.to_string())),
        "paper" => Some(CallbackAction::Paper(value.to_string())),
        "pick" => value.parse().ok().map(CallbackAction::Pick),
        _ => None,
    }
}

/// Shorten a button label on a char boundary
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn create_language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("English", "lang:en")],
        vec![InlineKeyboardButton::callback("Français", "lang:fr")],
    ])
}

/// One button per menu option, labelled from the catalog
pub fn create_options_keyboard(
    kind: &str,
    options: &[(&str, &str)],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let buttons = options
        .iter()
        .map(|(value, label_key)| {
            vec![InlineKeyboardButton::callback(
                t_lang(label_key, language_code),
                format!("{kind}:{value}"),
            )]
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(buttons)
}

/// Numbered buttons for the best candidates
pub fn create_candidates_keyboard(candidates: &[Candidate]) -> InlineKeyboardMarkup {
    let buttons = candidates
        .iter()
        .take(MAX_DISPLAYED_CANDIDATES)
        .enumerate()
        .map(|(i, candidate)| {
            let label = format!("{}. {}", i + 1, candidate.document.question);
            vec![InlineKeyboardButton::callback(
                truncate_label(&label, MAX_BUTTON_LABEL),
                format!("pick:{i}"),
            )]
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(buttons)
}

/// Format the displayed candidates as a numbered list
pub fn format_candidates_list(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .take(MAX_DISPLAYED_CANDIDATES)
        .enumerate()
        .map(|(i, candidate)| format!("{}. {}", i + 1, candidate.document.question))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages describing a lookup outcome, in sending order.
///
/// `balance` is the balance after the lookup and is only mentioned when a
/// coin was charged.
pub fn format_outcome_messages(
    outcome: &LookupOutcome,
    balance: Option<i64>,
    language_code: Option<&str>,
) -> Vec<String> {
    let mut messages = match outcome {
        LookupOutcome::Answered {
            answer, from_cache, ..
        } => {
            let key = if *from_cache { "answer-cached" } else { "answer-exact" };
            vec![t_args_lang(key, &[("answer", answer)], language_code)]
        }
        LookupOutcome::Similar {
            answer, candidates, ..
        } => {
            let mut messages = vec![t_lang("similar-found", language_code)];
            if let Some(best) = candidates.first() {
                messages.push(best.document.question.clone());
            }
            messages.push(answer.clone());
            messages
        }
        LookupOutcome::RateLimited => vec![t_lang("rate-limited", language_code)],
        LookupOutcome::InsufficientFunds { .. } => vec![t_lang("insufficient-funds", language_code)],
        LookupOutcome::NoPapersFound => vec![t_lang("no-papers", language_code)],
        LookupOutcome::NoMatch => vec![t_lang("no-match", language_code)],
        LookupOutcome::Failed { .. } => vec![t_lang("lookup-failed", language_code)],
    };

    if outcome.charged() {
        if let Some(balance) = balance {
            messages.push(t_args_lang(
                "coin-deducted",
                &[("coins", &balance.to_string())],
                language_code,
            ));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Document;

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate {
                document: Document::new(format!("Question {i}"), format!("Answer {i}")),
                score: 1.0 - i as f64 * 0.01,
            })
            .collect()
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(parse_callback("lang:fr"), Some(CallbackAction::Language(Locale::Fr)));
        assert_eq!(
            parse_callback("paper:Paper 1"),
            Some(CallbackAction::Paper("Paper 1".to_string()))
        );
        assert_eq!(parse_callback("pick:3"), Some(CallbackAction::Pick(3)));
        assert_eq!(parse_callback("pick:x"), None);
        assert_eq!(parse_callback("lang:de"), None);
        assert_eq!(parse_callback("garbage"), None);
    }

    #[test]
    fn test_truncate_label_is_char_safe() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("éééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_candidates_capped_for_display() {
        let keyboard = create_candidates_keyboard(&candidates(8));
        assert_eq!(keyboard.inline_keyboard.len(), MAX_DISPLAYED_CANDIDATES);

        let list = format_candidates_list(&candidates(8));
        assert_eq!(list.lines().count(), MAX_DISPLAYED_CANDIDATES);
        assert!(list.starts_with("1. Question 0"));
    }

    #[test]
    fn test_outcome_messages_for_similar() {
        let outcome = LookupOutcome::Similar {
            answer: "Answer 0".to_string(),
            candidates: candidates(3),
            charged: true,
        };

        let messages = format_outcome_messages(&outcome, Some(9), Some("en"));
        assert_eq!(messages[1], "Question 0");
        assert_eq!(messages[2], "Answer 0");
        assert!(messages[3].contains('9'));
    }

    #[test]
    fn test_outcome_messages_without_charge() {
        let messages = format_outcome_messages(&LookupOutcome::NoMatch, Some(9), Some("en"));
        assert_eq!(messages, vec!["No matching or similar questions found.".to_string()]);
    }

    #[test]
    fn test_outcome_messages_localized() {
        let outcome = LookupOutcome::Answered {
            answer: "4".to_string(),
            from_cache: true,
            charged: false,
        };
        let messages = format_outcome_messages(&outcome, None, Some("fr"));
        assert_eq!(messages, vec!["Réponse en cache : 4".to_string()]);
    }
}
