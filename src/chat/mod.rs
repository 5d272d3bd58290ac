//! Terminal front end for the chat backend.
//!
//! This module provides the pieces of the `parley-chat` REPL that are not
//! the REPL loop itself:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing for both views

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{
    AuthCommand, ChatCommand, auth_help_text, chat_help_text, parse_auth_command,
    parse_chat_command,
};
pub use config::{ChatArgs, ChatConfig};
