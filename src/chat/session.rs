// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session state
//!
//! Aggregates everything a running session owns: provider/model selection,
//! the open canonical document, the active mode, and the hex-id registry.
//! The document is exclusively owned here; no other component mutates it.

use std::path::PathBuf;

use crate::chat::document::{ChatDocument, ChatMessage};
use crate::chat::hex_id::HexIdRegistry;
use crate::chat::mode::{RetryState, SecretState, SessionMode};
use crate::error::{ParleyError, Result};

/// The open canonical document and where it came from.
#[derive(Debug)]
pub struct OpenChat {
    pub name: String,
    pub path: PathBuf,
    pub document: ChatDocument,
}

/// All state for one interactive session. Created once per run.
pub struct SessionState {
    provider_name: String,
    model: String,
    open: Option<OpenChat>,
    mode: SessionMode,
    registry: HexIdRegistry,
    dirty: bool,
}

impl SessionState {
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            open: None,
            mode: SessionMode::Normal,
            registry: HexIdRegistry::new(),
            dirty: false,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn set_provider(&mut self, name: impl Into<String>) {
        self.provider_name = name.into();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Whether a document is open (session not Idle).
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_chat(&self) -> Option<&OpenChat> {
        self.open.as_ref()
    }

    pub fn open_chat_mut(&mut self) -> Option<&mut OpenChat> {
        self.open.as_mut()
    }

    pub fn document(&self) -> Option<&ChatDocument> {
        self.open.as_ref().map(|o| &o.document)
    }

    pub fn document_mut(&mut self) -> Option<&mut ChatDocument> {
        self.open.as_mut().map(|o| &mut o.document)
    }

    pub fn document_path(&self) -> Option<&PathBuf> {
        self.open.as_ref().map(|o| &o.path)
    }

    /// Swap in a new canonical document. Any active mode is dropped without
    /// applying, and the registry is rebuilt from the new document.
    pub fn attach(&mut self, name: impl Into<String>, path: PathBuf, mut document: ChatDocument) {
        self.exit_mode();
        self.registry.rebuild(&mut document);
        self.open = Some(OpenChat {
            name: name.into(),
            path,
            document,
        });
        self.dirty = false;
    }

    /// Close the current document, dropping modes and transient ids.
    pub fn detach(&mut self) -> Option<OpenChat> {
        self.exit_mode();
        let mut empty = ChatDocument::new("");
        self.registry.rebuild(&mut empty);
        self.dirty = false;
        self.open.take()
    }

    /// Update the stored name/path after a rename on disk.
    pub fn set_location(&mut self, name: impl Into<String>, path: PathBuf) {
        if let Some(open) = self.open.as_mut() {
            open.name = name.into();
            open.path = path;
        }
    }

    pub fn registry(&self) -> &HexIdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HexIdRegistry {
        &mut self.registry
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut SessionMode {
        &mut self.mode
    }

    /// Enter retry mode. Fails while secret mode is active.
    pub fn enter_retry(&mut self, state: RetryState) -> Result<()> {
        match self.mode {
            SessionMode::Normal => {
                self.mode = SessionMode::Retry(state);
                Ok(())
            }
            SessionMode::Retry(_) => Err(ParleyError::Session(
                "retry mode is already active".to_string(),
            )),
            SessionMode::Secret(_) => Err(ParleyError::Session(
                "cannot enter retry while secret mode is active; /endsecret first".to_string(),
            )),
        }
    }

    /// Enter secret mode. Fails while retry mode is active.
    pub fn enter_secret(&mut self, state: SecretState) -> Result<()> {
        match self.mode {
            SessionMode::Normal => {
                self.mode = SessionMode::Secret(state);
                Ok(())
            }
            SessionMode::Secret(_) => Err(ParleyError::Session(
                "secret mode is already active".to_string(),
            )),
            SessionMode::Retry(_) => Err(ParleyError::Session(
                "cannot enter secret while retry mode is active; /cancel first".to_string(),
            )),
        }
    }

    /// Record a retry attempt. The reserved id from send time becomes the
    /// attempt id when present, keeping `/apply` references stable; a
    /// fresh id is drawn otherwise. Fails outside retry mode.
    pub fn record_retry_attempt(
        &mut self,
        reserved_id: Option<String>,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
        model: impl Into<String>,
        citations: Vec<crate::citations::Citation>,
    ) -> Result<String> {
        let id = reserved_id.unwrap_or_else(|| self.registry.assign());
        match &mut self.mode {
            SessionMode::Retry(retry) => {
                Ok(retry.record_attempt(id, user_text, assistant_text, model, citations))
            }
            _ => {
                self.registry.release(&id);
                Err(ParleyError::Session(
                    "retry mode is not active".to_string(),
                ))
            }
        }
    }

    /// Append a message to the canonical document, assigning it a hex id
    /// and marking the document dirty. Fails when no chat is open.
    pub fn append_message(&mut self, mut message: ChatMessage) -> Result<String> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| ParleyError::Session("no chat is open".to_string()))?;
        let position = open.document.len();
        let id = self.registry.assign_at(position);
        message.hex_id = Some(id.clone());
        open.document.push(message);
        self.dirty = true;
        Ok(id)
    }

    /// Pop the trailing message, releasing its hex id. Marks dirty.
    pub fn pop_message(&mut self) -> Option<ChatMessage> {
        let open = self.open.as_mut()?;
        let message = open.document.pop()?;
        if let Some(id) = &message.hex_id {
            self.registry.release(id);
        }
        self.dirty = true;
        Some(message)
    }

    /// Apply a retry attempt (the latest when `attempt_id` is None) to the
    /// canonical document, then leave retry mode. Nothing is mutated on
    /// failure.
    pub fn apply_retry_attempt(&mut self, attempt_id: Option<&str>) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| ParleyError::Session("no chat is open".to_string()))?;
        let SessionMode::Retry(retry) = &self.mode else {
            return Err(ParleyError::Session(
                "retry mode is not active".to_string(),
            ));
        };
        let id = attempt_id
            .map(str::to_string)
            .or_else(|| retry.latest_attempt_id().map(String::from))
            .ok_or_else(|| {
                ParleyError::Structural("no retry attempts recorded yet".to_string())
            })?;
        retry.apply(&id, &mut open.document)?;
        self.dirty = true;
        self.exit_mode();
        Ok(())
    }

    /// Drop any active mode without applying, releasing its transient ids.
    pub fn exit_mode(&mut self) -> SessionMode {
        let previous = self.mode.take();
        if let SessionMode::Retry(ref retry) = previous {
            retry.release_ids(&mut self.registry);
        }
        previous
    }

    /// Mark the canonical document as having uncommitted mutations.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
