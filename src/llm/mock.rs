// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted mock provider
//!
//! Replays enqueued responses in order, and echoes the last user message
//! when the script runs dry. Available at runtime under the provider name
//! "mock" (offline demos) and used heavily by the integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::document::Role;
use crate::citations::RawCitation;
use crate::error::{ProviderError, Result};
use crate::llm::provider::{
    ChatProvider, ChatRequest, ChunkStream, ResponseMeta, StreamEvent, Usage,
};

enum Script {
    Reply {
        chunks: Vec<String>,
        model: String,
        citations: Vec<RawCitation>,
    },
    Fail(ProviderError),
}

/// Provider double with scripted replies.
#[derive(Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<Script>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a streamed text reply.
    pub fn enqueue_text<I, S>(&self, chunks: I, model: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enqueue_with_citations(chunks, model, Vec::new());
    }

    /// Enqueue a streamed reply that carries raw citation records.
    pub fn enqueue_with_citations<I, S>(&self, chunks: I, model: &str, citations: Vec<RawCitation>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .expect("mock script lock")
            .push_back(Script::Reply {
                chunks: chunks.into_iter().map(Into::into).collect(),
                model: model.to_string(),
                citations,
            });
    }

    /// Enqueue a terminal failure for the next request.
    pub fn enqueue_error(&self, error: ProviderError) {
        self.script
            .lock()
            .expect("mock script lock")
            .push_back(Script::Fail(error));
    }

    fn echo_reply(request: &ChatRequest) -> Script {
        let echoed = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();
        Script::Reply {
            chunks: vec![format!("(mock) {}", echoed)],
            model: request.model.clone(),
            citations: Vec::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChunkStream> {
        let script = self
            .script
            .lock()
            .expect("mock script lock")
            .pop_front()
            .unwrap_or_else(|| Self::echo_reply(&request));

        let events: Vec<Result<StreamEvent>> = match script {
            Script::Reply {
                chunks,
                model,
                citations,
            } => {
                let completion_tokens = chunks.iter().map(|c| c.len() as u32 / 4).sum();
                let prompt_tokens = request
                    .messages
                    .iter()
                    .map(|m| m.text().len() as u32 / 4)
                    .sum();
                let mut events: Vec<Result<StreamEvent>> = chunks
                    .into_iter()
                    .map(|c| Ok(StreamEvent::TextDelta(c)))
                    .collect();
                events.push(Ok(StreamEvent::Done(ResponseMeta {
                    model,
                    usage: Usage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens: prompt_tokens + completion_tokens,
                    },
                    citations,
                })));
                events
            }
            Script::Fail(error) => vec![Err(error.into())],
        };

        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
