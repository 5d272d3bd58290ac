//! Slash command parsing for the chat application.
//!
//! The two views accept different commands. While authenticating, every line
//! must be a command; while chatting, anything that is not a command is sent
//! to the backend as a query.

/// A command accepted while signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    /// Log in as the named user; the password is prompted separately.
    Login(String),

    /// Register the named user; the password is prompted separately.
    Register(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// A command accepted while signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Upload the file at the given path, or nothing when no path was typed.
    Upload(Option<String>),

    /// Redraw the message log.
    History,

    /// Forget the session token.
    Logout,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses a line typed while signed out.
///
/// Plain text is not a command here, so it is reported as invalid rather
/// than passed through.
///
/// # Examples
///
/// ```
/// # use parley::chat::{AuthCommand, parse_auth_command};
/// assert_eq!(parse_auth_command("/login alice"), AuthCommand::Login("alice".to_string()));
/// assert_eq!(parse_auth_command("/quit"), AuthCommand::Quit);
/// ```
pub fn parse_auth_command(input: &str) -> AuthCommand {
    let Some((command, argument)) = split_command(input) else {
        return AuthCommand::Invalid(
            "Sign in first: /login <user> or /register <user>".to_string(),
        );
    };
    match command.as_str() {
        "login" => match argument {
            Some(user) => AuthCommand::Login(user.to_string()),
            None => AuthCommand::Invalid("/login requires a username".to_string()),
        },
        "register" => match argument {
            Some(user) => AuthCommand::Register(user.to_string()),
            None => AuthCommand::Invalid("/register requires a username".to_string()),
        },
        "help" | "?" => AuthCommand::Help,
        "quit" | "exit" | "q" => AuthCommand::Quit,
        _ => AuthCommand::Invalid(format!("Unknown command: /{}", command)),
    }
}

/// Parses a line typed while signed in.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be sent as a chat query.
///
/// # Examples
///
/// ```
/// # use parley::chat::parse_chat_command;
/// assert!(parse_chat_command("/logout").is_some());
/// assert!(parse_chat_command("/upload cat.png").is_some());
/// assert!(parse_chat_command("Hello there").is_none());
/// ```
pub fn parse_chat_command(input: &str) -> Option<ChatCommand> {
    let (command, argument) = split_command(input)?;
    let result = match command.as_str() {
        "upload" => ChatCommand::Upload(argument.map(str::to_string)),
        "history" => ChatCommand::History,
        "logout" => ChatCommand::Logout,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };
    Some(result)
}

fn split_command(input: &str) -> Option<(String, Option<&str>)> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
    Some((command, argument))
}

/// Returns help text for the signed-out view.
pub fn auth_help_text() -> &'static str {
    r#"Available commands:
  /login <user>          Log in (password is prompted)
  /register <user>       Create an account (password is prompted)
  /help                  Show this help message
  /quit                  Exit"#
}

/// Returns help text for the signed-in view.
pub fn chat_help_text() -> &'static str {
    r#"Type a message to chat. Available commands:
  /upload <path>         Upload a file
  /history               Redraw the conversation
  /logout                Sign out
  /help                  Show this help message
  /quit                  Exit"#
}
