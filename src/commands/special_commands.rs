//! Special commands parser for interactive chat mode
//!
//! Special commands manage the session instead of being submitted as a
//! prompt. They are prefixed with `/` and are case-insensitive, except for
//! conversation identifiers which are passed through as typed.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Create a new conversation for the current document and switch to it
    New,

    /// Switch to another conversation of the current document
    Switch(String),

    /// List the document's conversations
    List,

    /// Reload the active conversation from the backend
    Reload,

    /// Show status flags and dispatch settings
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the input is a prompt
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for unrecognized `/` input,
/// `CommandError::MissingArgument` for `/switch` without an identifier, and
/// `CommandError::UnsupportedArgument` when an argument-less command gets one.
///
/// # Examples
///
/// ```
/// use docchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(
///     parse_special_command("/switch c2").unwrap(),
///     SpecialCommand::Switch("c2".to_string())
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    // only the command word is case-folded
    let (head, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, Some(rest.trim())),
        None => (trimmed, None),
    };
    let command = head.to_lowercase();

    let no_arg = |parsed: SpecialCommand| match arg {
        Some(arg) => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
        None => Ok(parsed),
    };

    match command.as_str() {
        "/new" => no_arg(SpecialCommand::New),
        "/switch" | "/open" => match arg {
            Some(id) if !id.is_empty() => Ok(SpecialCommand::Switch(id.to_string())),
            _ => Err(CommandError::MissingArgument {
                command: "/switch".to_string(),
                usage: "/switch <conversation_id>".to_string(),
            }),
        },
        "/list" | "/ls" => no_arg(SpecialCommand::List),
        "/reload" => no_arg(SpecialCommand::Reload),
        "/status" => no_arg(SpecialCommand::ShowStatus),
        "/help" | "/?" => no_arg(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => no_arg(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CONVERSATIONS:
  /new              - Create a new conversation for this document
  /switch <id>      - Switch to another conversation (alias: /open)
  /list             - List this document's conversations (alias: /ls)
  /reload           - Reload the current conversation

SESSION INFORMATION:
  /status           - Show loading flags and dispatch settings
  /help             - Show this help message
  /?                - Same as /help

SESSION CONTROL:
  /exit, exit       - Exit interactive mode
  /quit, quit       - Same as exit

NOTES:
  - Commands are case-insensitive; conversation ids are not
  - Any other text is submitted as a prompt
  - Each prompt runs a full round of questions against the document
"#
    );
}
