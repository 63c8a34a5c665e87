// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat document persistence
//!
//! Whole-document JSON files under the chats directory, one per chat.
//! Saves stamp `updated_at` and are atomic from the orchestrator's point
//! of view: written to a temp file in the same directory, then renamed.
//! Hex ids never reach disk (`#[serde(skip)]` on the field).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::chat::document::ChatDocument;
use crate::error::{ParleyError, Result};

/// Store for chat documents in a single directory.
pub struct ChatStore {
    root: PathBuf,
}

/// Summary row for chat listings.
#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub name: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl ChatStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// File path for a chat name.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}.json", name)))
    }

    /// Whether a chat with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Load a document, returning an empty-but-valid one when the path
    /// does not exist.
    pub fn load(&self, path: &Path) -> Result<ChatDocument> {
        if !path.exists() {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(ChatDocument::new(title));
        }
        let content = std::fs::read_to_string(path)?;
        let document: ChatDocument = serde_json::from_str(&content)?;
        Ok(document)
    }

    /// Persist the whole document. Stamps `updated_at` before writing.
    pub fn save(&self, path: &Path, document: &mut ChatDocument) -> Result<()> {
        document.metadata.updated_at = Utc::now();
        document.derive_title();

        let content = serde_json::to_string_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(
            target: "parley.chat.store",
            path = %path.display(),
            messages = document.len(),
            "chat document saved"
        );
        Ok(())
    }

    /// Delete a chat file.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ParleyError::Store(format!("no such chat: {}", name)));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Rename a chat file.
    pub fn rename(&self, old: &str, new: &str) -> Result<PathBuf> {
        let old_path = self.path_for(old)?;
        let new_path = self.path_for(new)?;
        if !old_path.exists() {
            return Err(ParleyError::Store(format!("no such chat: {}", old)));
        }
        if new_path.exists() {
            return Err(ParleyError::Store(format!("chat already exists: {}", new)));
        }
        std::fs::rename(&old_path, &new_path)?;
        Ok(new_path)
    }

    /// List chats, most recently updated first.
    pub fn list(&self) -> Result<Vec<ChatInfo>> {
        let mut infos = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skip files we cannot parse rather than failing the listing.
            match self.load(&path) {
                Ok(document) => infos.push(ChatInfo {
                    name: name.to_string(),
                    title: document.metadata.title.clone(),
                    updated_at: document.metadata.updated_at,
                    message_count: document.len(),
                }),
                Err(err) => {
                    tracing::warn!(
                        target: "parley.chat.store",
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable chat file"
                    );
                }
            }
        }
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(infos)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '.') || c.is_control())
    {
        return Err(ParleyError::InvalidInput(format!(
            "invalid chat name: {:?}",
            name
        )));
    }
    Ok(())
}
