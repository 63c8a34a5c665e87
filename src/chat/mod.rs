// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! The canonical document model, transient hex-id addressing, the session
//! mode machine (normal / retry / secret), on-disk persistence, and the
//! orchestrator that ties them together.

pub mod document;
pub mod hex_id;
pub mod mode;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use document::{ChatDocument, ChatMessage, ChatMetadata, Role};
pub use hex_id::HexIdRegistry;
pub use mode::{RetryAttempt, RetryState, SecretState, SessionMode};
pub use orchestrator::{Action, ChatOrchestrator, PendingRequest, RequestMode, SendRequest};
pub use session::{OpenChat, SessionState};
pub use store::{ChatInfo, ChatStore};
