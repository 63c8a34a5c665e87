// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Transient message addressing
//!
//! Hex ids let a user reference a specific message in commands ("show
//! message a3f"). They live only for the lifetime of a run: never
//! persisted, rebuilt from scratch whenever the active document changes.
//! Only uniqueness at any instant is guaranteed; stability across
//! structural edits is not.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::chat::document::ChatDocument;

/// Default id length: 3 hex digits, 4096 combinations
const DEFAULT_LENGTH: usize = 3;

/// Collision retries at a given length before growing by one digit
const RETRIES_PER_LENGTH: u32 = 3;

const HEX_DIGITS: &[u8] = b"0123456789abcdef";

/// Registry of currently-assigned hex ids plus the position map for the
/// active document.
#[derive(Debug, Default)]
pub struct HexIdRegistry {
    live: HashSet<String>,
    by_position: HashMap<String, usize>,
}

impl HexIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and register a fresh id, not tied to a document position.
    /// Digit growth guarantees eventual success; this never fails.
    pub fn assign(&mut self) -> String {
        let mut length = DEFAULT_LENGTH;
        loop {
            for _ in 0..RETRIES_PER_LENGTH {
                let candidate = random_hex(length);
                if self.live.insert(candidate.clone()) {
                    return candidate;
                }
            }
            length += 1;
        }
    }

    /// Generate an id and map it to a document position.
    pub fn assign_at(&mut self, position: usize) -> String {
        let id = self.assign();
        self.by_position.insert(id.clone(), position);
        id
    }

    /// Document position for an id, if it addresses one.
    pub fn lookup_index(&self, id: &str) -> Option<usize> {
        self.by_position.get(id).copied()
    }

    /// Remove an id from the live set (e.g., when a message is popped on
    /// cancellation).
    pub fn release(&mut self, id: &str) {
        self.live.remove(id);
        self.by_position.remove(id);
    }

    /// Whether an id is currently assigned.
    pub fn contains(&self, id: &str) -> bool {
        self.live.contains(id)
    }

    /// Number of live ids.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drop everything and assign fresh ids to every message in the
    /// document, attaching them in memory. Called whenever the active
    /// document changes.
    pub fn rebuild(&mut self, document: &mut ChatDocument) {
        self.live.clear();
        self.by_position.clear();
        for position in 0..document.messages.len() {
            let id = self.assign_at(position);
            document.messages[position].hex_id = Some(id);
        }
    }
}

fn random_hex(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char)
        .collect()
}
