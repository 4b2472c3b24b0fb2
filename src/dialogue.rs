//! Conversation state for the paper selection and question dialogue.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::fetcher::PaperFilter;
use crate::matcher::Candidate;

pub const MAX_QUESTION_LENGTH: usize = 1000;

/// Subject choices as (callback value, catalog key)
pub const SUBJECTS: [(&str, &str); 3] = [
    ("Mathematics", "subject-mathematics"),
    ("Physics", "subject-physics"),
    ("Chemistry", "subject-chemistry"),
];

pub const LEVELS: [(&str, &str); 2] = [("O-Level", "level-o"), ("A-Level", "level-a")];

pub const PAPERS: [(&str, &str); 2] = [("Paper 1", "paper-1"), ("Paper 2", "paper-2")];

/// Represents the conversation state of one chat
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum PaperDialogueState {
    #[default]
    Start,
    ChoosingLanguage,
    ChoosingSubject {
        language_code: String,
    },
    ChoosingLevel {
        language_code: String,
        subject: String,
    },
    ChoosingPaper {
        language_code: String,
        subject: String,
        level: String,
    },
    AwaitingQuestion {
        language_code: String,
        filter: PaperFilter,
    },
    BrowsingCandidates {
        language_code: String,
        filter: PaperFilter,
        candidates: Vec<Candidate>,
    },
}

impl PaperDialogueState {
    /// Language chosen so far in this conversation, if any
    pub fn language_code(&self) -> Option<&str> {
        match self {
            PaperDialogueState::Start | PaperDialogueState::ChoosingLanguage => None,
            PaperDialogueState::ChoosingSubject { language_code }
            | PaperDialogueState::ChoosingLevel { language_code, .. }
            | PaperDialogueState::ChoosingPaper { language_code, .. }
            | PaperDialogueState::AwaitingQuestion { language_code, .. }
            | PaperDialogueState::BrowsingCandidates { language_code, .. } => {
                Some(language_code.as_str())
            }
        }
    }

    /// Filter selected so far, once the menu is complete
    pub fn filter(&self) -> Option<&PaperFilter> {
        match self {
            PaperDialogueState::AwaitingQuestion { filter, .. }
            | PaperDialogueState::BrowsingCandidates { filter, .. } => Some(filter),
            _ => None,
        }
    }
}

/// Type alias for our paper dialogue
pub type PaperDialogue = Dialogue<PaperDialogueState, InMemStorage<PaperDialogueState>>;

/// Accept a callback value only if it is one of the menu options
pub fn parse_choice(options: &[(&str, &str)], value: &str) -> Option<String> {
    options
        .iter()
        .find(|(option, _)| *option == value)
        .map(|(option, _)| option.to_string())
}

/// Validates a question input
pub fn validate_question(text: &str) -> Result<String, &'static str> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_QUESTION_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}
