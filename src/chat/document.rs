// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Canonical chat document types
//!
//! The document is the only state that survives a process restart. Hex ids
//! are attached to messages in memory only and are stripped on save by
//! virtue of `#[serde(skip)]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::citations::Citation;
use crate::utils::truncate_summary;

/// Maximum characters kept when deriving a title from the first message
const TITLE_MAX_CHARS: usize = 80;

/// Role of a message in the canonical document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Persisted provider failure
    Error,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Error => write!(f, "error"),
        }
    }
}

/// A message in the canonical document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender
    pub role: Role,

    /// Content as ordered lines
    pub content: Vec<String>,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// Model that produced the message (assistant only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Normalized citations (assistant only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,

    /// Transient addressing id. Never persisted, never read back.
    #[serde(skip)]
    pub hex_id: Option<String>,
}

impl ChatMessage {
    /// Create a user message from raw text (split into lines)
    pub fn user(text: impl AsRef<str>) -> Self {
        Self {
            role: Role::User,
            content: split_lines(text.as_ref()),
            timestamp: Utc::now(),
            model: None,
            citations: None,
            hex_id: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl AsRef<str>, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: split_lines(text.as_ref()),
            timestamp: Utc::now(),
            model: Some(model.into()),
            citations: None,
            hex_id: None,
        }
    }

    /// Create an error message
    pub fn error(text: impl AsRef<str>) -> Self {
        Self {
            role: Role::Error,
            content: split_lines(text.as_ref()),
            timestamp: Utc::now(),
            model: None,
            citations: None,
            hex_id: None,
        }
    }

    /// Attach citations (assistant messages only; empty lists are dropped)
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = if citations.is_empty() {
            None
        } else {
            Some(citations)
        };
        self
    }

    /// The message content joined back into a single string
    pub fn text(&self) -> String {
        self.content.join("\n")
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Document metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMetadata {
    /// Chat title (defaults from the first user message)
    pub title: String,

    /// Optional free-form summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Name of the system prompt profile used, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// When the chat was created
    pub created_at: DateTime<Utc>,

    /// When the chat was last saved
    pub updated_at: DateTime<Utc>,
}

/// The canonical, persisted chat transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDocument {
    /// Document metadata
    pub metadata: ChatMetadata,

    /// Ordered messages
    pub messages: Vec<ChatMessage>,
}

impl ChatDocument {
    /// Create a new, empty document with the given title
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            metadata: ChatMetadata {
                title: title.into(),
                summary: None,
                system_prompt: None,
                created_at: now,
                updated_at: now,
            },
            messages: Vec::new(),
        }
    }

    /// Whether the document contains no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// The last message, if any
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Whether the last committed turn is an error (the pending-error gate)
    pub fn has_pending_error(&self) -> bool {
        matches!(self.last(), Some(m) if m.role == Role::Error)
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Remove and return the last message
    pub fn pop(&mut self) -> Option<ChatMessage> {
        self.messages.pop()
    }

    /// Index of the last assistant or error message, if any
    pub fn last_reply_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| matches!(m.role, Role::Assistant | Role::Error))
    }

    /// Default the title from the first user message when the current title
    /// is empty or still a placeholder.
    pub fn derive_title(&mut self) {
        if !self.metadata.title.is_empty() {
            return;
        }
        if let Some(first_user) = self.messages.iter().find(|m| m.role == Role::User) {
            self.metadata.title = truncate_summary(&first_user.text(), TITLE_MAX_CHARS);
        }
    }
}
