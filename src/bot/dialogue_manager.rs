//! Dialogue Manager module for running lookups and moving the dialogue along

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{validate_question, PaperDialogue, PaperDialogueState, MAX_QUESTION_LENGTH};

use crate::fetcher::PaperFilter;
use crate::lookup::{LookupOutcome, LookupService};

// Import UI builder functions
use super::ui_builder::{create_candidates_keyboard, format_candidates_list, format_outcome_messages};

/// Handle a question typed once the paper filter is complete
pub async fn handle_question_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PaperDialogue,
    service: Arc<LookupService>,
    user_id: i64,
    text: &str,
    filter: PaperFilter,
    language_code: &str,
) -> Result<()> {
    let lang = Some(language_code);

    let question = match validate_question(text) {
        Ok(question) => question,
        Err("too_long") => {
            bot.send_message(
                msg.chat.id,
                t_args_lang("question-too-long", &[("max", &MAX_QUESTION_LENGTH.to_string())], lang),
            )
            .await?;
            return Ok(());
        }
        Err(_) => {
            bot.send_message(msg.chat.id, t_lang("question-empty", lang))
                .await?;
            return Ok(());
        }
    };

    debug!(user_id = %user_id, filter = %filter, "Running lookup for question");
    let outcome = service.lookup(user_id, &question, &filter).await;

    let balance = if outcome.charged() {
        match service.ledger().get_user(user_id).await {
            Ok(user) => user.map(|u| u.balance),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to read balance after lookup");
                None
            }
        }
    } else {
        None
    };

    for message in format_outcome_messages(&outcome, balance, lang) {
        bot.send_message(msg.chat.id, message).await?;
    }

    match outcome {
        LookupOutcome::Similar { candidates, .. } => {
            let listing = format!("{}\n{}", t_lang("similar-list", lang), format_candidates_list(&candidates));
            bot.send_message(msg.chat.id, listing)
                .reply_markup(create_candidates_keyboard(&candidates))
                .await?;

            dialogue
                .update(PaperDialogueState::BrowsingCandidates {
                    language_code: language_code.to_string(),
                    filter,
                    candidates,
                })
                .await?;
        }
        LookupOutcome::InsufficientFunds { .. } => {
            // Nothing more can be asked until the balance changes
            dialogue.exit().await?;
        }
        _ => {
            // Ready for the next question on the same paper
            dialogue
                .update(PaperDialogueState::AwaitingQuestion {
                    language_code: language_code.to_string(),
                    filter,
                })
                .await?;
        }
    }

    Ok(())
}
