//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles commands and typed questions
//! - `callback_handler`: Handles the language, paper and candidate keyboards
//! - `ui_builder`: Creates keyboards and formats lookup outcomes
//! - `dialogue_manager`: Runs lookups and moves the dialogue to the next state

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use ui_builder::{format_outcome_messages, parse_callback, CallbackAction};
