//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, error, warn};

// Import localization
use crate::localization::{detect_language, t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{parse_choice, PaperDialogue, PaperDialogueState, LEVELS, PAPERS, SUBJECTS};

use crate::fetcher::PaperFilter;
use crate::lookup::{select_candidate, LookupService, Selection};

// Import UI builder functions
use super::ui_builder::{
    create_candidates_keyboard, create_options_keyboard, format_candidates_list, parse_callback,
    CallbackAction,
};

/// Replace the menu message with the next step, or send a fresh one when it
/// can no longer be edited
async fn show_menu(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<teloxide::types::MessageId>,
    text: String,
    keyboard: teloxide::types::InlineKeyboardMarkup,
) -> Result<()> {
    if let Some(message_id) = message_id {
        match bot
            .edit_message_text(chat_id, message_id, text.clone())
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to edit menu message, sending a new one");
            }
        }
    }

    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    service: Arc<LookupService>,
    dialogue: PaperDialogue,
) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    debug!(user_id = %user_id, "Received callback query from user");

    // Stop the button spinner before anything below can fail
    bot.answer_callback_query(q.id.clone()).await?;

    let state = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = %user_id, dialogue_state = ?state, "Retrieved dialogue state");

    let Some(msg) = &q.message else {
        return Ok(());
    };
    let chat_id = msg.chat().id;
    let message_id = Some(msg.id());

    let action = q.data.as_deref().and_then(parse_callback);

    match (action, state) {
        (Some(CallbackAction::Language(locale)), _) => {
            if let Err(e) = service.ensure_user(user_id).await {
                error!(user_id = %user_id, error = %e, "Failed to create user before setting language");
            } else if let Err(e) = service.ledger().set_locale(user_id, locale).await {
                error!(user_id = %user_id, error = %e, "Failed to store language preference");
            }

            let language_code = locale.code();
            let lang = Some(language_code);
            bot.send_message(chat_id, t_lang("language-set", lang)).await?;
            show_menu(
                &bot,
                chat_id,
                message_id,
                t_lang("choose-subject", lang),
                create_options_keyboard("subject", &SUBJECTS, lang),
            )
            .await?;

            dialogue
                .update(PaperDialogueState::ChoosingSubject {
                    language_code: language_code.to_string(),
                })
                .await?;
        }
        (
            Some(CallbackAction::Subject(value)),
            PaperDialogueState::ChoosingSubject { language_code },
        ) => {
            let lang = Some(language_code.as_str());
            match parse_choice(&SUBJECTS, &value) {
                Some(subject) => {
                    show_menu(
                        &bot,
                        chat_id,
                        message_id,
                        t_lang("choose-level", lang),
                        create_options_keyboard("level", &LEVELS, lang),
                    )
                    .await?;
                    dialogue
                        .update(PaperDialogueState::ChoosingLevel {
                            language_code,
                            subject,
                        })
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, t_lang("invalid-selection", lang))
                        .await?;
                }
            }
        }
        (
            Some(CallbackAction::Level(value)),
            PaperDialogueState::ChoosingLevel {
                language_code,
                subject,
            },
        ) => {
            let lang = Some(language_code.as_str());
            match parse_choice(&LEVELS, &value) {
                Some(level) => {
                    show_menu(
                        &bot,
                        chat_id,
                        message_id,
                        t_lang("choose-paper", lang),
                        create_options_keyboard("paper", &PAPERS, lang),
                    )
                    .await?;
                    dialogue
                        .update(PaperDialogueState::ChoosingPaper {
                            language_code,
                            subject,
                            level,
                        })
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, t_lang("invalid-selection", lang))
                        .await?;
                }
            }
        }
        (
            Some(CallbackAction::Paper(value)),
            PaperDialogueState::ChoosingPaper {
                language_code,
                subject,
                level,
            },
        ) => {
            let lang = Some(language_code.as_str());
            match parse_choice(&PAPERS, &value) {
                Some(paper) => {
                    let filter = PaperFilter::new(subject, level, paper);
                    debug!(user_id = %user_id, filter = %filter, "Paper selection complete");
                    bot.send_message(chat_id, t_lang("enter-question", lang))
                        .await?;
                    dialogue
                        .update(PaperDialogueState::AwaitingQuestion {
                            language_code,
                            filter,
                        })
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, t_lang("invalid-selection", lang))
                        .await?;
                }
            }
        }
        (
            Some(CallbackAction::Pick(index)),
            PaperDialogueState::BrowsingCandidates {
                language_code,
                candidates,
                ..
            },
        ) => {
            let lang = Some(language_code.as_str());
            match select_candidate(&candidates, index) {
                Selection::Chosen(document) => {
                    debug!(user_id = %user_id, index, "User picked a similar question");
                    bot.send_message(chat_id, document.question).await?;
                    bot.send_message(
                        chat_id,
                        t_args_lang("selected-answer", &[("answer", &document.answer)], lang),
                    )
                    .await?;
                    // Keep the list open for further picks
                    let listing = format!("{}\n{}", t_lang("similar-list", lang), format_candidates_list(&candidates));
                    bot.send_message(chat_id, listing)
                        .reply_markup(create_candidates_keyboard(&candidates))
                        .await?;
                }
                Selection::Invalid => {
                    bot.send_message(chat_id, t_lang("invalid-selection", lang))
                        .await?;
                }
            }
        }
        (_, state) => {
            // Stale keyboard or unknown data
            let lang = detect_language(state.language_code().or(q.from.language_code.as_deref()));
            debug!(user_id = %user_id, data = ?q.data, "Ignoring callback outside its dialogue step");
            bot.send_message(chat_id, t_lang("selection-incomplete", Some(lang)))
                .await?;
        }
    }

    Ok(())
}
