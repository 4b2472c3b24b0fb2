//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, info};

// Import localization
use crate::localization::{detect_language, t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{PaperDialogue, PaperDialogueState};

use crate::lookup::LookupService;

// Import dialogue manager functions
use super::dialogue_manager::handle_question_input;

// Import UI builder functions
use super::ui_builder::create_language_keyboard;

/// Command name of a `/command[@bot_name] [args]` message
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    first.split('@').next()
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    dialogue: PaperDialogue,
    service: &LookupService,
    user_id: i64,
    language_code: &str,
) -> Result<()> {
    let lang = Some(language_code);
    info!(user_id = %user_id, "User started the bot");

    let greeting = match service.ledger().get_user(user_id).await {
        Ok(Some(user)) => {
            t_args_lang("welcome-back", &[("coins", &user.balance.to_string())], lang)
        }
        Ok(None) => match service.ensure_user(user_id).await {
            Ok(user) => t_args_lang("welcome-new", &[("coins", &user.balance.to_string())], lang),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to create user");
                bot.send_message(msg.chat.id, t_lang("lookup-failed", lang))
                    .await?;
                return Ok(());
            }
        },
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to load user");
            bot.send_message(msg.chat.id, t_lang("lookup-failed", lang))
                .await?;
            return Ok(());
        }
    };
    bot.send_message(msg.chat.id, greeting).await?;

    bot.send_message(msg.chat.id, t_lang("choose-language", lang))
        .reply_markup(create_language_keyboard())
        .await?;
    dialogue.update(PaperDialogueState::ChoosingLanguage).await?;

    Ok(())
}

async fn handle_balance(
    bot: &Bot,
    msg: &Message,
    service: &LookupService,
    user_id: i64,
    language_code: &str,
) -> Result<()> {
    let lang = Some(language_code);
    let reply = match service.ensure_user(user_id).await {
        Ok(user) => t_args_lang("balance", &[("coins", &user.balance.to_string())], lang),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to load balance");
            t_lang("lookup-failed", lang)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    text: &str,
    dialogue: PaperDialogue,
    service: Arc<LookupService>,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    debug!(user_id = %user_id, message_length = text.len(), "Received text message from user");

    let state = dialogue.get().await?.unwrap_or_default();

    // Dialogue language first, then the Telegram client language
    let language_code = detect_language(
        state
            .language_code()
            .or(from.language_code.as_deref()),
    );
    let lang = Some(language_code);

    match command_name(text) {
        Some("/start") => {
            handle_start(bot, msg, dialogue, &service, user_id, language_code).await?;
        }
        Some("/balance") => {
            handle_balance(bot, msg, &service, user_id, language_code).await?;
        }
        Some("/cancel") => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, t_lang("cancelled", lang))
                .await?;
        }
        Some("/help") => {
            bot.send_message(msg.chat.id, t_lang("help-commands", lang))
                .await?;
        }
        _ => match state.filter() {
            Some(filter) => {
                handle_question_input(
                    bot,
                    msg,
                    dialogue,
                    service,
                    user_id,
                    text,
                    filter.clone(),
                    language_code,
                )
                .await?;
            }
            None => {
                bot.send_message(msg.chat.id, t_lang("selection-incomplete", lang))
                    .await?;
            }
        },
    }

    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    debug!(chat_id = %msg.chat.id, "Received unsupported message type from user");
    bot.send_message(msg.chat.id, t_lang("unsupported", Some(detect_language(language_code))))
        .await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    service: Arc<LookupService>,
    dialogue: PaperDialogue,
) -> Result<()> {
    match msg.text() {
        Some(text) => handle_text_message(&bot, &msg, text, dialogue, service).await?,
        None => handle_unsupported_message(&bot, &msg).await?,
    }

    Ok(())
}
