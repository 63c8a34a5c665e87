// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry and secret scratch modes
//!
//! Both modes freeze a snapshot of the canonical transcript and accumulate
//! ephemeral turns on top of it. Nothing here touches the canonical
//! document except an explicit retry `apply`. `SessionMode` is a single
//! enum, so retry and secret are mutually exclusive by construction.

use crate::chat::document::{ChatDocument, ChatMessage};
use crate::chat::hex_id::HexIdRegistry;
use crate::citations::Citation;
use crate::error::{ParleyError, Result};

/// The active mode of a session. One of the two scratch modes, or neither.
#[derive(Debug, Default)]
pub enum SessionMode {
    /// Canonical-document flow
    #[default]
    Normal,
    /// Re-asking the last turn without committing attempts
    Retry(RetryState),
    /// Off-the-record turns that never reach the canonical document
    Secret(SecretState),
}

impl SessionMode {
    pub fn is_normal(&self) -> bool {
        matches!(self, SessionMode::Normal)
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, SessionMode::Retry(_))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, SessionMode::Secret(_))
    }

    pub fn as_retry(&self) -> Option<&RetryState> {
        match self {
            SessionMode::Retry(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_retry_mut(&mut self) -> Option<&mut RetryState> {
        match self {
            SessionMode::Retry(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretState> {
        match self {
            SessionMode::Secret(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_secret_mut(&mut self) -> Option<&mut SecretState> {
        match self {
            SessionMode::Secret(state) => Some(state),
            _ => None,
        }
    }

    /// Swap the mode back to Normal, returning what was active.
    pub fn take(&mut self) -> SessionMode {
        std::mem::take(self)
    }
}

/// One recorded retry attempt. Every attempt is kept so the user can
/// compare and apply any of them.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// Ephemeral attempt id (drawn from the hex-id registry)
    pub id: String,
    /// The user text sent for this attempt
    pub user_text: String,
    /// The assistant reply
    pub assistant_text: String,
    /// Model that produced the reply
    pub model: String,
    /// Normalized citations, if any
    pub citations: Vec<Citation>,
}

/// Frozen context and attempt log for retry mode.
#[derive(Debug)]
pub struct RetryState {
    base_messages: Vec<ChatMessage>,
    target_index: usize,
    attempts: Vec<RetryAttempt>,
}

impl RetryState {
    /// Capture the frozen context (the transcript minus the retried turn)
    /// and the document position an applied attempt will overwrite.
    pub fn new(base_messages: Vec<ChatMessage>, target_index: usize) -> Self {
        Self {
            base_messages,
            target_index,
            attempts: Vec::new(),
        }
    }

    pub fn base_messages(&self) -> &[ChatMessage] {
        &self.base_messages
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    /// Append a new attempt under a pre-assigned ephemeral id (drawn from
    /// the session's hex-id registry). Earlier attempts are never
    /// overwritten.
    pub fn record_attempt(
        &mut self,
        id: String,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
        model: impl Into<String>,
        citations: Vec<Citation>,
    ) -> String {
        self.attempts.push(RetryAttempt {
            id: id.clone(),
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            model: model.into(),
            citations,
        });
        id
    }

    pub fn get_attempt(&self, id: &str) -> Option<&RetryAttempt> {
        self.attempts.iter().find(|a| a.id == id)
    }

    pub fn latest_attempt_id(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.id.as_str())
    }

    /// Replace the target message with an assistant message built from the
    /// attempt, preserving the target's existing hex id. Fails without
    /// mutating anything when the attempt is unknown or the target index no
    /// longer fits the current document.
    pub fn apply(&self, attempt_id: &str, document: &mut ChatDocument) -> Result<()> {
        let attempt = self.get_attempt(attempt_id).ok_or_else(|| {
            ParleyError::Structural(format!("unknown retry attempt: {}", attempt_id))
        })?;
        if self.target_index >= document.len() {
            return Err(ParleyError::Structural(format!(
                "retry target {} is no longer valid (document has {} messages)",
                self.target_index,
                document.len()
            )));
        }

        let existing_hex_id = document.messages[self.target_index].hex_id.clone();
        let mut replacement = ChatMessage::assistant(&attempt.assistant_text, &attempt.model)
            .with_citations(attempt.citations.clone());
        replacement.hex_id = existing_hex_id;
        document.messages[self.target_index] = replacement;
        Ok(())
    }

    /// Release every attempt id from the registry. Called on mode exit.
    pub fn release_ids(&self, registry: &mut HexIdRegistry) {
        for attempt in &self.attempts {
            registry.release(&attempt.id);
        }
    }
}

/// Frozen context and ephemeral transcript for secret mode.
#[derive(Debug)]
pub struct SecretState {
    base_messages: Vec<ChatMessage>,
    transcript: Vec<ChatMessage>,
    pending_error: bool,
}

impl SecretState {
    /// Snapshot the canonical transcript as of mode entry.
    pub fn new(base_messages: Vec<ChatMessage>) -> Self {
        Self {
            base_messages,
            transcript: Vec::new(),
            pending_error: false,
        }
    }

    /// Whether a failed secret request is blocking further secret turns.
    pub fn pending_error(&self) -> bool {
        self.pending_error
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Grow the ephemeral transcript with a completed turn.
    ///
    /// Panics if a pending error has not been cleared by exiting the mode;
    /// the orchestrator gates user turns before sending.
    pub fn append_success(
        &mut self,
        user_text: impl AsRef<str>,
        assistant_text: impl AsRef<str>,
        model: impl Into<String>,
    ) {
        assert!(
            !self.pending_error,
            "secret transcript has a pending error; exit the mode first"
        );
        self.transcript.push(ChatMessage::user(user_text));
        self.transcript
            .push(ChatMessage::assistant(assistant_text, model));
    }

    /// Record a failed turn and set the pending-error gate.
    pub fn append_error(&mut self, message: impl AsRef<str>, user_text: impl AsRef<str>) {
        self.transcript.push(ChatMessage::user(user_text));
        self.transcript.push(ChatMessage::error(message));
        self.pending_error = true;
    }

    /// Base + ephemeral transcript, the context for the next secret call.
    pub fn transcript_for_request(&self) -> Vec<ChatMessage> {
        let mut messages = self.base_messages.clone();
        messages.extend(self.transcript.iter().cloned());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::document::Role;

    fn doc_with(messages: Vec<ChatMessage>) -> ChatDocument {
        let mut doc = ChatDocument::new("t");
        for m in messages {
            doc.push(m);
        }
        doc
    }

    #[test]
    fn test_session_mode_default_normal() {
        let mode = SessionMode::default();
        assert!(mode.is_normal());
        assert!(!mode.is_retry());
        assert!(!mode.is_secret());
    }

    #[test]
    fn test_session_mode_take_resets_to_normal() {
        let mut mode = SessionMode::Secret(SecretState::new(vec![]));
        let taken = mode.take();
        assert!(taken.is_secret());
        assert!(mode.is_normal());
    }

    #[test]
    fn test_retry_attempts_all_kept() {
        let mut registry = HexIdRegistry::new();
        let mut retry = RetryState::new(vec![], 1);

        let first = retry.record_attempt(registry.assign(), "u2a", "a2a", "m", vec![]);
        let second = retry.record_attempt(registry.assign(), "u2b", "a2b", "m", vec![]);

        assert_ne!(first, second);
        assert_eq!(retry.attempts().len(), 2);
        assert_eq!(retry.get_attempt(&first).unwrap().assistant_text, "a2a");
        assert_eq!(retry.latest_attempt_id(), Some(second.as_str()));
    }

    #[test]
    fn test_retry_apply_replaces_target_only() {
        let mut registry = HexIdRegistry::new();
        let mut doc = doc_with(vec![ChatMessage::user("u1"), ChatMessage::assistant("a1", "m")]);
        registry.rebuild(&mut doc);
        let target_hex = doc.messages[1].hex_id.clone();

        let mut retry = RetryState::new(vec![], 1);
        retry.record_attempt(registry.assign(), "u2a", "a2a", "m", vec![]);
        let second = retry.record_attempt(registry.assign(), "u2b", "a2b", "m", vec![]);

        retry.apply(&second, &mut doc).unwrap();

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.messages[0].text(), "u1");
        assert_eq!(doc.messages[1].role, Role::Assistant);
        assert_eq!(doc.messages[1].text(), "a2b");
        // References to the replaced message stay valid.
        assert_eq!(doc.messages[1].hex_id, target_hex);
    }

    #[test]
    fn test_retry_apply_unknown_attempt() {
        let mut doc = doc_with(vec![ChatMessage::user("u1"), ChatMessage::assistant("a1", "m")]);
        let retry = RetryState::new(vec![], 1);
        let err = retry.apply("nope", &mut doc).unwrap_err();
        assert!(err.to_string().contains("unknown retry attempt"));
        assert_eq!(doc.messages[1].text(), "a1");
    }

    #[test]
    fn test_retry_apply_stale_target_index() {
        let mut registry = HexIdRegistry::new();
        // Document was mutated while retry was active: target out of range.
        let mut doc = doc_with(vec![ChatMessage::user("u1")]);
        let mut retry = RetryState::new(vec![], 1);
        let id = retry.record_attempt(registry.assign(), "u", "a", "m", vec![]);

        let err = retry.apply(&id, &mut doc).unwrap_err();
        assert!(err.to_string().contains("no longer valid"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_retry_release_ids() {
        let mut registry = HexIdRegistry::new();
        let mut retry = RetryState::new(vec![], 0);
        let id = retry.record_attempt(registry.assign(), "u", "a", "m", vec![]);
        assert!(registry.contains(&id));
        retry.release_ids(&mut registry);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_secret_transcript_for_request() {
        let base = vec![ChatMessage::user("u1"), ChatMessage::assistant("a1", "m")];
        let mut secret = SecretState::new(base);
        secret.append_success("s1", "r1", "m");

        let messages = secret.transcript_for_request();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text(), "s1");
        assert_eq!(messages[3].text(), "r1");
    }

    #[test]
    fn test_secret_error_sets_pending_gate() {
        let mut secret = SecretState::new(vec![]);
        secret.append_error("rate limited", "s1");
        assert!(secret.pending_error());
        assert_eq!(secret.transcript().len(), 2);
        assert_eq!(secret.transcript()[1].role, Role::Error);
    }

    #[test]
    #[should_panic(expected = "pending error")]
    fn test_secret_append_success_after_error_panics() {
        let mut secret = SecretState::new(vec![]);
        secret.append_error("boom", "s1");
        secret.append_success("s2", "r2", "m");
    }
}
