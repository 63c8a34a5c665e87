// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input parsing for the interactive prompt.
//!
//! Pure functions that classify a line of user input as either a chat
//! message or a slash command. No side effects, easily testable.

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New(String),
    Open(String),
    Chats,
    Close,
    Rename(String),
    Delete(String),
    Show(Option<String>),
    Retry,
    Attempts,
    Apply(Option<String>),
    Cancel,
    Secret,
    EndSecret,
    Model(Option<String>),
    Provider(Option<String>),
    Help,
    Quit,
}

/// Classification of a raw input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    /// Blank line, nothing to do.
    Empty,
    /// Plain text destined for the model.
    Message(&'a str),
    /// A recognized slash command.
    Command(Command),
    /// Something starting with '/' that we do not recognize.
    Unknown(String),
}

/// Parse a raw input line into a message or command.
pub fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if !trimmed.starts_with('/') {
        return Input::Message(trimmed);
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let command = match name.to_lowercase().as_str() {
        "/new" => match arg {
            Some(name) => Command::New(name.to_string()),
            None => return Input::Unknown("usage: /new <name>".to_string()),
        },
        "/open" => match arg {
            Some(name) => Command::Open(name.to_string()),
            None => return Input::Unknown("usage: /open <name>".to_string()),
        },
        "/chats" | "/list" => Command::Chats,
        "/close" => Command::Close,
        "/rename" => match arg {
            Some(name) => Command::Rename(name.to_string()),
            None => return Input::Unknown("usage: /rename <new-name>".to_string()),
        },
        "/delete" => match arg {
            Some(name) => Command::Delete(name.to_string()),
            None => return Input::Unknown("usage: /delete <name>".to_string()),
        },
        "/show" => Command::Show(arg.map(str::to_string)),
        "/retry" => Command::Retry,
        "/attempts" => Command::Attempts,
        "/apply" => Command::Apply(arg.map(str::to_string)),
        "/cancel" => Command::Cancel,
        "/secret" => Command::Secret,
        "/endsecret" => Command::EndSecret,
        "/model" | "/models" => Command::Model(arg.map(str::to_string)),
        "/provider" | "/providers" => Command::Provider(arg.map(str::to_string)),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Input::Unknown(format!("unknown command: {other}")),
    };

    Input::Command(command)
}

/// Help text listing every command the prompt understands.
pub fn help_text() -> String {
    [
        "/new <name>       create a chat and open it",
        "/open <name>      open an existing chat",
        "/chats            list saved chats",
        "/close            close the current chat",
        "/rename <name>    rename the current chat",
        "/delete <name>    delete a saved chat",
        "/show [id]        show the chat, or one message by id",
        "/retry            re-roll the last reply",
        "/attempts         list retry attempts",
        "/apply [id]       accept a retry attempt",
        "/cancel           leave retry mode, keep the original",
        "/secret           start an off-the-record exchange",
        "/endsecret        discard the off-the-record exchange",
        "/model [name]     show or switch the model",
        "/provider [name]  show or switch the provider",
        "/help             show this help",
        "/quit             save and exit",
    ]
    .join("\n")
}
