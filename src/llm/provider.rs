// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider abstraction
//!
//! The orchestrator consumes providers through this trait only: send a
//! message list, get an in-order stream of text chunks terminated by a
//! `Done` event carrying usage and raw citations. Retry/backoff on
//! transient failures is each provider's own concern; only terminal
//! outcomes reach the stream.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::document::ChatMessage;
use crate::citations::RawCitation;
use crate::error::{ProviderError, Result};

/// A request to a chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,

    /// Messages in conversation order
    pub messages: Vec<ChatMessage>,

    /// Optional system prompt
    pub system_prompt: Option<String>,

    /// Whether the caller wants incremental chunks
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            system_prompt: None,
            stream: true,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Token usage statistics reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Terminal metadata for a completed response.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    /// Model that actually served the request
    pub model: String,

    /// Token usage
    pub usage: Usage,

    /// Raw citation records, pre-normalization
    pub citations: Vec<RawCitation>,
}

/// Events on the response stream. Chunks arrive in order; the stream ends
/// with either `Done` or a terminal error item.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental response text
    TextDelta(String),

    /// End of response with final metadata
    Done(ResponseMeta),
}

/// Boxed chunk stream returned by providers.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Main trait for chat providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., "anthropic", "mock")
    fn name(&self) -> &str;

    /// Send a request and stream the response.
    async fn send(&self, request: ChatRequest) -> Result<ChunkStream>;
}

impl std::fmt::Debug for dyn ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Fully drained response: accumulated text plus terminal metadata.
#[derive(Debug)]
pub struct StreamOutcome {
    pub text: String,
    pub meta: ResponseMeta,
}

/// Drain a chunk stream, invoking `on_delta` for each text chunk.
///
/// Returns the accumulated text and terminal metadata, or the stream's
/// terminal error. A stream that ends without a `Done` event is a
/// provider bug surfaced as a stream error.
pub async fn drain_stream<F>(mut stream: ChunkStream, mut on_delta: F) -> Result<StreamOutcome>
where
    F: FnMut(&str),
{
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => {
                on_delta(&delta);
                text.push_str(&delta);
            }
            StreamEvent::Done(meta) => return Ok(StreamOutcome { text, meta }),
        }
    }
    Err(ProviderError::Stream("stream ended without terminal metadata".to_string()).into())
}
