use anyhow::Result;

use paperbot::dialogue::{parse_choice, validate_question, PaperDialogueState, LEVELS, PAPERS, SUBJECTS};
use paperbot::fetcher::PaperFilter;
use paperbot::matcher::{Candidate, Document};

/// Test dialogue states survive serialization
#[test]
fn test_dialogue_state_serialization() -> Result<()> {
    let state = PaperDialogueState::BrowsingCandidates {
        language_code: "fr".to_string(),
        filter: PaperFilter::new("Chemistry", "A-Level", "Paper 2"),
        candidates: vec![Candidate {
            document: Document::new("Define an isotope.", "Same element, different neutron count"),
            score: 0.9,
        }],
    };

    let json = serde_json::to_string(&state)?;
    let restored: PaperDialogueState = serde_json::from_str(&json)?;

    assert_eq!(restored.language_code(), Some("fr"));
    assert_eq!(
        restored.filter(),
        Some(&PaperFilter::new("Chemistry", "A-Level", "Paper 2"))
    );
    match restored {
        PaperDialogueState::BrowsingCandidates { candidates, .. } => {
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].document.question, "Define an isotope.");
        }
        other => panic!("unexpected state {other:?}"),
    }
    Ok(())
}

#[test]
fn test_filter_only_after_full_selection() {
    assert!(PaperDialogueState::Start.filter().is_none());
    assert!(PaperDialogueState::ChoosingPaper {
        language_code: "en".to_string(),
        subject: "Physics".to_string(),
        level: "O-Level".to_string(),
    }
    .filter()
    .is_none());

    let awaiting = PaperDialogueState::AwaitingQuestion {
        language_code: "en".to_string(),
        filter: PaperFilter::new("Physics", "O-Level", "Paper 1"),
    };
    assert_eq!(awaiting.filter().map(|f| f.paper.as_str()), Some("Paper 1"));
}

#[test]
fn test_language_unknown_before_choice() {
    assert_eq!(PaperDialogueState::default().language_code(), None);
    assert_eq!(PaperDialogueState::ChoosingLanguage.language_code(), None);
    assert_eq!(
        PaperDialogueState::ChoosingSubject {
            language_code: "fr".to_string()
        }
        .language_code(),
        Some("fr")
    );
}

#[test]
fn test_menu_choices() {
    for (value, _) in SUBJECTS.iter().chain(LEVELS.iter()).chain(PAPERS.iter()) {
        assert!(parse_choice(&SUBJECTS, value).is_some()
            || parse_choice(&LEVELS, value).is_some()
            || parse_choice(&PAPERS, value).is_some());
    }
    assert_eq!(parse_choice(&SUBJECTS, "Biology"), None);
}

#[test]
fn test_question_input_validation() {
    assert_eq!(validate_question("  What is work?\n").unwrap(), "What is work?");
    assert_eq!(validate_question(""), Err("empty"));
    assert!(validate_question(&"é".repeat(1000)).is_ok());
    assert_eq!(validate_question(&"é".repeat(1001)), Err("too_long"));
}
