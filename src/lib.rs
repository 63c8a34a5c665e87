// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Parley - multi-provider AI chat for your terminal.
//!
//! This crate exposes the shared runtime used by the `parley` CLI
//! (`src/main.rs`).
//!
//! Architecture highlights:
//! - `chat`: canonical document, session modes, hex-id addressing, and the
//!   orchestrator that owns the request lifecycle
//! - `llm`: provider abstraction, preflight, and the provider factory
//! - `citations`: citation normalization and redirect resolution
//! - `config`: settings loaded from `~/.parley/settings.json`
//! - `cli`: argument definitions and prompt input parsing

pub mod chat;
pub mod citations;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod utils;

pub use error::{ParleyError, Result};
