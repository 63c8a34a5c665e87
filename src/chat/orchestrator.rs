// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session orchestration: turns parsed input into provider requests and
//! folds responses, errors, and cancellations back into session state.
//!
//! The orchestrator owns the request lifecycle contracts. A user turn is
//! appended before the request goes out; if the request fails before or
//! during streaming, the orchestrator rolls the document back so a failed
//! or cancelled turn never leaves an orphaned user message behind. Retry
//! and secret turns never touch the canonical document at all until an
//! attempt is explicitly applied.

use tracing::{debug, warn};

use crate::chat::document::{ChatDocument, ChatMessage, Role};
use crate::chat::mode::{RetryState, SecretState, SessionMode};
use crate::chat::session::SessionState;
use crate::chat::store::ChatStore;
use crate::citations::{self, Citation, RawCitation, RedirectResolver};
use crate::cli::input::{help_text, parse_input, Command, Input};
use crate::config::Settings;
use crate::error::{ParleyError, Result};
use crate::llm::provider::{ChatRequest, StreamOutcome};
use crate::utils::{redact_credentials, truncate_summary};

const ATTEMPT_PREVIEW_CHARS: usize = 60;

/// Which lifecycle a request belongs to; decides where its outcome lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Normal,
    Retry,
    Secret,
}

/// Context carried across an in-flight request, handed back to the
/// orchestrator with the outcome.
#[derive(Debug)]
pub struct PendingRequest {
    pub mode: RequestMode,
    pub user_text: String,
    /// Hex id reserved at send time; becomes the attempt id in retry mode.
    pub reserved_id: Option<String>,
}

/// A fully built provider request plus its lifecycle context.
#[derive(Debug)]
pub struct SendRequest {
    pub request: ChatRequest,
    pub pending: PendingRequest,
}

/// What the caller should do next after handling a line of input.
#[derive(Debug)]
pub enum Action {
    /// Display this text and prompt again.
    Print(String),
    /// Dispatch this request to the active provider.
    Send(SendRequest),
    /// Nothing to display; prompt again.
    Continue,
    /// Save and exit the loop.
    Break,
}

/// Drives one interactive session against the chat store.
pub struct ChatOrchestrator {
    settings: Settings,
    store: ChatStore,
    session: SessionState,
    resolver: Option<RedirectResolver>,
}

impl ChatOrchestrator {
    pub fn new(settings: Settings, store: ChatStore, session: SessionState) -> Self {
        let resolver = if settings.citations.resolve_redirects {
            match RedirectResolver::with_limits(
                settings.citations.max_concurrent_resolves,
                std::time::Duration::from_secs(settings.citations.resolve_timeout_secs),
            ) {
                Ok(resolver) => Some(resolver),
                Err(e) => {
                    warn!(target: "parley.citations", "redirect resolver unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            settings,
            store,
            session,
            resolver,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Classify a line of input and produce the next action.
    pub fn handle_input(&mut self, line: &str) -> Result<Action> {
        match parse_input(line) {
            Input::Empty => Ok(Action::Continue),
            Input::Message(text) => self.handle_user_message(text),
            Input::Command(command) => self.handle_command(command),
            Input::Unknown(message) => Ok(Action::Print(message)),
        }
    }

    /// Turn a plain message into a provider request for the active mode.
    pub fn handle_user_message(&mut self, text: &str) -> Result<Action> {
        if !self.session.is_open() {
            return Ok(Action::Print(
                "no chat is open; /new <name> or /open <name> first".to_string(),
            ));
        }
        match self.session.mode() {
            SessionMode::Normal => self.build_normal_request(text),
            SessionMode::Retry(_) => self.build_retry_request(text),
            SessionMode::Secret(_) => self.build_secret_request(text),
        }
    }

    fn build_normal_request(&mut self, text: &str) -> Result<Action> {
        let document = self.require_document()?;
        if document.has_pending_error() {
            return Ok(Action::Print(
                "the last reply failed; /retry to try again, or /show to inspect".to_string(),
            ));
        }
        self.session.append_message(ChatMessage::user(text))?;
        let messages = self.require_document()?.messages.clone();
        let request = self.base_request(messages);
        Ok(Action::Send(SendRequest {
            request,
            pending: PendingRequest {
                mode: RequestMode::Normal,
                user_text: text.to_string(),
                reserved_id: None,
            },
        }))
    }

    fn build_retry_request(&mut self, text: &str) -> Result<Action> {
        let retry = self
            .session
            .mode()
            .as_retry()
            .ok_or_else(|| ParleyError::Session("retry mode is not active".to_string()))?;
        let mut messages = retry.base_messages().to_vec();
        messages.push(ChatMessage::user(text));
        let request = self.base_request(messages);
        // Reserved now so the attempt keeps a stable id even if another
        // message lands while this request is in flight.
        let reserved = self.session.registry_mut().assign();
        Ok(Action::Send(SendRequest {
            request,
            pending: PendingRequest {
                mode: RequestMode::Retry,
                user_text: text.to_string(),
                reserved_id: Some(reserved),
            },
        }))
    }

    fn build_secret_request(&mut self, text: &str) -> Result<Action> {
        let secret = self
            .session
            .mode()
            .as_secret()
            .ok_or_else(|| ParleyError::Session("secret mode is not active".to_string()))?;
        if secret.pending_error() {
            return Ok(Action::Print(
                "the last secret exchange failed; /endsecret to leave".to_string(),
            ));
        }
        let mut messages = secret.transcript_for_request();
        messages.push(ChatMessage::user(text));
        let request = self.base_request(messages);
        Ok(Action::Send(SendRequest {
            request,
            pending: PendingRequest {
                mode: RequestMode::Secret,
                user_text: text.to_string(),
                reserved_id: None,
            },
        }))
    }

    fn base_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(self.session.model(), messages);
        if let Some(prompt) = self
            .session
            .document()
            .and_then(|d| d.metadata.system_prompt.clone())
        {
            request = request.with_system_prompt(prompt);
        }
        request
    }

    /// Fold a completed response back into the session for its mode.
    pub async fn handle_ai_response(
        &mut self,
        pending: PendingRequest,
        outcome: StreamOutcome,
    ) -> Result<Action> {
        let citations = self.process_citations(outcome.meta.citations).await;
        let model = outcome.meta.model;
        match pending.mode {
            RequestMode::Normal => {
                let footer = format_citations(&citations);
                let message =
                    ChatMessage::assistant(&outcome.text, &model).with_citations(citations);
                self.session.append_message(message)?;
                self.commit()?;
                Ok(match footer {
                    Some(footer) => Action::Print(footer),
                    None => Action::Continue,
                })
            }
            RequestMode::Retry => {
                let id = self.session.record_retry_attempt(
                    pending.reserved_id,
                    pending.user_text,
                    &outcome.text,
                    &model,
                    citations,
                )?;
                Ok(Action::Print(format!(
                    "recorded attempt [{id}]; /apply {id} to keep it, or send another prompt"
                )))
            }
            RequestMode::Secret => {
                let secret = self
                    .session
                    .mode_mut()
                    .as_secret_mut()
                    .ok_or_else(|| ParleyError::Session("secret mode is not active".to_string()))?;
                secret.append_success(&pending.user_text, &outcome.text, model);
                Ok(Action::Continue)
            }
        }
    }

    /// Fold a failed request back into the session. The canonical document
    /// never keeps the user turn of a failed request; in normal mode the
    /// failure is recorded as an error turn in its place.
    pub fn handle_ai_error(&mut self, pending: PendingRequest, error: &ParleyError) -> Result<Action> {
        let redacted = redact_credentials(&error.to_string());
        match pending.mode {
            RequestMode::Normal => {
                self.session.pop_message();
                self.session.append_message(ChatMessage::error(&redacted))?;
                self.commit()?;
                Ok(Action::Print(format!("request failed: {redacted}")))
            }
            RequestMode::Retry => {
                if let Some(id) = &pending.reserved_id {
                    self.session.registry_mut().release(id);
                }
                Ok(Action::Print(format!(
                    "attempt failed: {redacted}\nsend another prompt, or /cancel"
                )))
            }
            RequestMode::Secret => {
                let secret = self
                    .session
                    .mode_mut()
                    .as_secret_mut()
                    .ok_or_else(|| ParleyError::Session("secret mode is not active".to_string()))?;
                secret.append_error(&redacted, &pending.user_text);
                Ok(Action::Print(format!(
                    "secret request failed: {redacted}\n/endsecret to leave"
                )))
            }
        }
    }

    /// Undo the pre-send mutations after the user interrupts a request.
    /// No error turn is recorded; the document reads as if the turn never
    /// happened.
    pub fn handle_user_cancel(&mut self, pending: PendingRequest) -> Result<Action> {
        self.rollback(&pending)?;
        Ok(Action::Print("cancelled".to_string()))
    }

    /// Undo the pre-send mutations when the request could not be
    /// dispatched at all (missing credentials, unknown provider).
    pub fn rollback_pre_send_failure(
        &mut self,
        pending: PendingRequest,
        error: &ParleyError,
    ) -> Result<Action> {
        self.rollback(&pending)?;
        let redacted = redact_credentials(&error.to_string());
        Ok(Action::Print(format!("could not send: {redacted}")))
    }

    fn rollback(&mut self, pending: &PendingRequest) -> Result<()> {
        match pending.mode {
            RequestMode::Normal => {
                self.session.pop_message();
                self.commit()?;
            }
            RequestMode::Retry => {
                if let Some(id) = &pending.reserved_id {
                    self.session.registry_mut().release(id);
                }
            }
            RequestMode::Secret => {}
        }
        Ok(())
    }

    /// Execute a slash command.
    pub fn handle_command(&mut self, command: Command) -> Result<Action> {
        match command {
            Command::New(name) => self.cmd_new(&name),
            Command::Open(name) => self.cmd_open(&name),
            Command::Chats => self.cmd_chats(),
            Command::Close => self.cmd_close(),
            Command::Rename(name) => self.cmd_rename(&name),
            Command::Delete(name) => self.cmd_delete(&name),
            Command::Show(id) => self.cmd_show(id.as_deref()),
            Command::Retry => self.cmd_retry(),
            Command::Attempts => self.cmd_attempts(),
            Command::Apply(id) => self.cmd_apply(id.as_deref()),
            Command::Cancel => self.cmd_cancel(),
            Command::Secret => self.cmd_secret(),
            Command::EndSecret => self.cmd_endsecret(),
            Command::Model(name) => self.cmd_model(name.as_deref()),
            Command::Provider(name) => self.cmd_provider(name.as_deref()),
            Command::Help => Ok(Action::Print(help_text())),
            Command::Quit => {
                self.flush()?;
                Ok(Action::Break)
            }
        }
    }

    fn cmd_new(&mut self, name: &str) -> Result<Action> {
        if self.store.exists(name) {
            return Ok(Action::Print(format!(
                "a chat named '{name}' already exists; /open {name} instead"
            )));
        }
        self.flush()?;
        let path = self.store.path_for(name)?;
        let mut document = ChatDocument::new("");
        self.store.save(&path, &mut document)?;
        self.session.attach(name, path, document);
        Ok(Action::Print(format!("created chat '{name}'")))
    }

    fn cmd_open(&mut self, name: &str) -> Result<Action> {
        if !self.store.exists(name) {
            return Ok(Action::Print(format!(
                "no chat named '{name}'; /chats to list, /new {name} to create"
            )));
        }
        self.flush()?;
        let path = self.store.path_for(name)?;
        let document = self.store.load(&path)?;
        let count = document.len();
        self.session.attach(name, path, document);
        Ok(Action::Print(format!("opened '{name}' ({count} messages)")))
    }

    fn cmd_chats(&mut self) -> Result<Action> {
        let chats = self.store.list()?;
        if chats.is_empty() {
            return Ok(Action::Print("no saved chats; /new <name> to start".to_string()));
        }
        let lines: Vec<String> = chats
            .iter()
            .map(|info| {
                format!(
                    "{}  {} ({} messages, updated {})",
                    info.name,
                    if info.title.is_empty() {
                        "(untitled)"
                    } else {
                        &info.title
                    },
                    info.message_count,
                    info.updated_at.format("%Y-%m-%d %H:%M"),
                )
            })
            .collect();
        Ok(Action::Print(lines.join("\n")))
    }

    fn cmd_close(&mut self) -> Result<Action> {
        if !self.session.is_open() {
            return Ok(Action::Print("no chat is open".to_string()));
        }
        self.flush()?;
        let closed = self.session.detach();
        let name = closed.map(|c| c.name).unwrap_or_default();
        Ok(Action::Print(format!("closed '{name}'")))
    }

    fn cmd_rename(&mut self, new_name: &str) -> Result<Action> {
        let Some(open) = self.session.open_chat() else {
            return Ok(Action::Print("no chat is open".to_string()));
        };
        let old_name = open.name.clone();
        self.flush()?;
        let new_path = self.store.rename(&old_name, new_name)?;
        self.session.set_location(new_name, new_path);
        Ok(Action::Print(format!("renamed '{old_name}' to '{new_name}'")))
    }

    fn cmd_delete(&mut self, name: &str) -> Result<Action> {
        self.flush()?;
        let is_current = self
            .session
            .open_chat()
            .map(|open| open.name == name)
            .unwrap_or(false);
        if is_current {
            self.session.detach();
        }
        self.store.delete(name)?;
        Ok(Action::Print(format!("deleted '{name}'")))
    }

    fn cmd_show(&mut self, id: Option<&str>) -> Result<Action> {
        let document = self.require_document()?;
        match id {
            None => {
                if document.is_empty() {
                    return Ok(Action::Print("(empty chat)".to_string()));
                }
                let lines: Vec<String> =
                    document.messages.iter().map(format_message).collect();
                Ok(Action::Print(lines.join("\n")))
            }
            Some(id) => {
                if let Some(index) = self.session.registry().lookup_index(id) {
                    if let Some(message) = document.messages.get(index) {
                        return Ok(Action::Print(format_message_full(message)));
                    }
                }
                if let Some(attempt) =
                    self.session.mode().as_retry().and_then(|r| r.get_attempt(id))
                {
                    return Ok(Action::Print(format!(
                        "[{}] attempt ({}):\n{}",
                        attempt.id, attempt.model, attempt.assistant_text
                    )));
                }
                Ok(Action::Print(format!("no message with id '{id}'")))
            }
        }
    }

    fn cmd_retry(&mut self) -> Result<Action> {
        let document = self.require_document()?;
        let Some(target) = document.last_reply_index() else {
            return Ok(Action::Print("nothing to retry yet".to_string()));
        };
        // The frozen context excludes the retried reply and, when present,
        // the user turn that prompted it; that turn is re-entered (verbatim
        // or edited) as the attempt prompt.
        let preceded_by_user = target > 0 && document.messages[target - 1].role == Role::User;
        let base_end = if preceded_by_user { target - 1 } else { target };
        let base = document.messages[..base_end].to_vec();
        let original = preceded_by_user.then(|| document.messages[target - 1].text());

        // Mode conflicts are user-recoverable; surface them as prompts
        // rather than propagating.
        match self.session.enter_retry(RetryState::new(base, target)) {
            Ok(()) => {}
            Err(ParleyError::Session(message)) => return Ok(Action::Print(message)),
            Err(e) => return Err(e),
        }
        debug!(target: "parley.chat", target_index = target, "entered retry mode");

        let mut text = "retry mode: send a prompt to generate an attempt; \
                        /apply keeps one, /cancel keeps the original"
            .to_string();
        if let Some(original) = original {
            text.push_str(&format!("\noriginal prompt: {original}"));
        }
        Ok(Action::Print(text))
    }

    fn cmd_attempts(&mut self) -> Result<Action> {
        let Some(retry) = self.session.mode().as_retry() else {
            return Ok(Action::Print("retry mode is not active".to_string()));
        };
        if retry.attempts().is_empty() {
            return Ok(Action::Print(
                "no attempts yet; send a prompt to generate one".to_string(),
            ));
        }
        let lines: Vec<String> = retry
            .attempts()
            .iter()
            .map(|a| {
                format!(
                    "[{}] {}: {}",
                    a.id,
                    a.model,
                    truncate_summary(&a.assistant_text, ATTEMPT_PREVIEW_CHARS)
                )
            })
            .collect();
        Ok(Action::Print(lines.join("\n")))
    }

    fn cmd_apply(&mut self, id: Option<&str>) -> Result<Action> {
        match self.session.apply_retry_attempt(id) {
            Ok(()) => {
                self.commit()?;
                Ok(Action::Print("attempt applied".to_string()))
            }
            Err(ParleyError::Structural(message)) | Err(ParleyError::Session(message)) => {
                Ok(Action::Print(message))
            }
            Err(e) => Err(e),
        }
    }

    fn cmd_cancel(&mut self) -> Result<Action> {
        if !self.session.mode().is_retry() {
            return Ok(Action::Print("retry mode is not active".to_string()));
        }
        self.session.exit_mode();
        Ok(Action::Print(
            "retry cancelled; the original reply is kept".to_string(),
        ))
    }

    fn cmd_secret(&mut self) -> Result<Action> {
        let document = self.require_document()?;
        let base = document.messages.clone();
        match self.session.enter_secret(SecretState::new(base)) {
            Ok(()) => {}
            Err(ParleyError::Session(message)) => return Ok(Action::Print(message)),
            Err(e) => return Err(e),
        }
        Ok(Action::Print(
            "secret mode: exchanges are not saved; /endsecret to discard and leave".to_string(),
        ))
    }

    fn cmd_endsecret(&mut self) -> Result<Action> {
        if !self.session.mode().is_secret() {
            return Ok(Action::Print("secret mode is not active".to_string()));
        }
        self.session.exit_mode();
        Ok(Action::Print("secret exchange discarded".to_string()))
    }

    fn cmd_model(&mut self, name: Option<&str>) -> Result<Action> {
        match name {
            None => Ok(Action::Print(format!("model: {}", self.session.model()))),
            Some(model) => {
                self.session.set_model(model);
                Ok(Action::Print(format!("model set to {model}")))
            }
        }
    }

    fn cmd_provider(&mut self, name: Option<&str>) -> Result<Action> {
        match name {
            None => Ok(Action::Print(format!(
                "provider: {} (model {})",
                self.session.provider_name(),
                self.session.model()
            ))),
            Some(provider) => {
                let Some(config) = self.settings.provider(provider) else {
                    return Ok(Action::Print(format!("unknown provider '{provider}'")));
                };
                let model = config.default_model.clone();
                self.session.set_provider(provider);
                self.session.set_model(&model);
                Ok(Action::Print(format!(
                    "provider set to {provider} (model {model})"
                )))
            }
        }
    }

    /// Save the open document, stamping `updated_at` and defaulting the
    /// title, then clear the dirty flag.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(open) = self.session.open_chat_mut() {
            self.store.save(&open.path, &mut open.document)?;
        }
        self.session.take_dirty();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.session.is_dirty() {
            self.commit()
        } else {
            Ok(())
        }
    }

    fn require_document(&self) -> Result<&ChatDocument> {
        self.session
            .document()
            .ok_or_else(|| ParleyError::Session("no chat is open".to_string()))
    }

    /// Normalize raw citations and, when enabled and needed, resolve
    /// redirect-style URLs. Resolution failures degrade to unresolved
    /// citations; they never fail the turn.
    async fn process_citations(&self, raw: Vec<RawCitation>) -> Vec<Citation> {
        let citations = citations::normalize(raw);
        if citations.is_empty() {
            return citations;
        }
        let needs_resolution = citations
            .iter()
            .any(|c| c.url.as_deref().is_some_and(RedirectResolver::is_redirect_url));
        match &self.resolver {
            Some(resolver) if needs_resolution => resolver.resolve_all(citations).await,
            _ => citations,
        }
    }
}

fn format_citations(citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }
    let lines: Vec<String> = citations
        .iter()
        .map(|c| {
            let title = c.title.as_deref().unwrap_or("(untitled)");
            match &c.url {
                Some(url) => format!("[{}] {} - {}", c.number, title, url),
                None => format!("[{}] {} (unresolved)", c.number, title),
            }
        })
        .collect();
    Some(lines.join("\n"))
}

fn format_message(message: &ChatMessage) -> String {
    let id = message.hex_id.as_deref().unwrap_or("---");
    format!(
        "[{id}] {}: {}",
        message.role,
        truncate_summary(&message.text(), 80)
    )
}

fn format_message_full(message: &ChatMessage) -> String {
    let id = message.hex_id.as_deref().unwrap_or("---");
    let mut out = format!("[{id}] {}:\n{}", message.role, message.text());
    if let Some(citations) = &message.citations {
        if let Some(footer) = format_citations(citations) {
            out.push('\n');
            out.push_str(&footer);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use tempfile::TempDir;

    fn orchestrator() -> (ChatOrchestrator, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.citations.resolve_redirects = false;
        let store = ChatStore::open(dir.path()).unwrap();
        let session = SessionState::new("mock", "mock-model");
        (ChatOrchestrator::new(settings, store, session), dir)
    }

    fn open_chat(orch: &mut ChatOrchestrator, name: &str) {
        match orch.handle_command(Command::New(name.to_string())).unwrap() {
            Action::Print(_) => {}
            other => panic!("unexpected action: {other:?}"),
        }
    }

    fn outcome(text: &str) -> StreamOutcome {
        StreamOutcome {
            text: text.to_string(),
            meta: crate::llm::provider::ResponseMeta {
                model: "mock-model".to_string(),
                usage: Default::default(),
                citations: vec![],
            },
        }
    }

    #[test]
    fn test_message_without_open_chat() {
        let (mut orch, _dir) = orchestrator();
        let action = orch.handle_input("hello").unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("no chat is open")));
    }

    #[test]
    fn test_normal_message_appends_user_turn() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let action = orch.handle_input("hello").unwrap();
        let Action::Send(send) = action else {
            panic!("expected send");
        };
        assert_eq!(send.pending.mode, RequestMode::Normal);
        assert_eq!(send.request.messages.len(), 1);
        assert_eq!(orch.session().document().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_normal_turn_commits_both_messages() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("hi there"))
            .await
            .unwrap();
        let doc = orch.session().document().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.messages[1].role, Role::Assistant);
        assert!(!orch.session().is_dirty());
    }

    #[tokio::test]
    async fn test_error_turn_replaces_user_message() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Network("connection reset".to_string()));
        orch.handle_ai_error(send.pending, &error).unwrap();
        let doc = orch.session().document().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.messages[0].role, Role::Error);
        assert!(doc.has_pending_error());
    }

    #[test]
    fn test_pending_error_gates_normal_sends() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Network("boom".to_string()));
        orch.handle_ai_error(send.pending, &error).unwrap();

        let action = orch.handle_input("again").unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("/retry")));
    }

    #[test]
    fn test_cancel_restores_document() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        orch.handle_user_cancel(send.pending).unwrap();
        assert!(orch.session().document().unwrap().is_empty());
        assert!(!orch.session().is_dirty());
    }

    #[test]
    fn test_pre_send_failure_rolls_back_and_commits() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Preflight(
            "no API key configured".to_string(),
        ));
        let action = orch.rollback_pre_send_failure(send.pending, &error).unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("could not send")));
        assert!(orch.session().document().unwrap().is_empty());
        assert!(!orch.session().is_dirty());
    }

    #[tokio::test]
    async fn test_retry_attempts_leave_document_untouched() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();

        orch.handle_command(Command::Retry).unwrap();
        let Action::Send(send) = orch.handle_input("q1 but better").unwrap() else {
            panic!("expected send");
        };
        assert_eq!(send.pending.mode, RequestMode::Retry);
        assert!(send.pending.reserved_id.is_some());
        // The frozen context excludes the retried pair.
        assert!(send.request.messages.len() == 1);

        orch.handle_ai_response(send.pending, outcome("a2")).await.unwrap();
        let doc = orch.session().document().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.messages[1].text(), "a1");
    }

    #[tokio::test]
    async fn test_apply_swaps_reply_and_preserves_length() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();
        let original_id = orch.session().document().unwrap().messages[1]
            .hex_id
            .clone();

        orch.handle_command(Command::Retry).unwrap();
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a2")).await.unwrap();
        orch.handle_command(Command::Apply(None)).unwrap();

        let doc = orch.session().document().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.messages[1].text(), "a2");
        assert_eq!(doc.messages[1].hex_id, original_id);
        assert!(orch.session().mode().is_normal());
    }

    #[tokio::test]
    async fn test_retry_of_error_turn() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Network("boom".to_string()));
        orch.handle_ai_error(send.pending, &error).unwrap();

        orch.handle_command(Command::Retry).unwrap();
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("recovered")).await.unwrap();
        orch.handle_command(Command::Apply(None)).unwrap();

        let doc = orch.session().document().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.messages[0].role, Role::Assistant);
        assert!(!doc.has_pending_error());
    }

    #[tokio::test]
    async fn test_secret_turns_never_persist() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();

        orch.handle_command(Command::Secret).unwrap();
        let Action::Send(send) = orch.handle_input("secret q").unwrap() else {
            panic!("expected send");
        };
        // Secret requests carry the canonical context plus the new turn.
        assert_eq!(send.request.messages.len(), 3);
        orch.handle_ai_response(send.pending, outcome("secret a")).await.unwrap();

        assert_eq!(orch.session().document().unwrap().len(), 2);
        orch.handle_command(Command::EndSecret).unwrap();
        assert_eq!(orch.session().document().unwrap().len(), 2);
        assert!(orch.session().mode().is_normal());
    }

    #[test]
    fn test_secret_error_gates_further_secret_turns() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        orch.handle_command(Command::Secret).unwrap();
        let Action::Send(send) = orch.handle_input("secret q").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Network("boom".to_string()));
        orch.handle_ai_error(send.pending, &error).unwrap();

        let action = orch.handle_input("another").unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("/endsecret")));
        // The canonical document never saw any of it.
        assert!(orch.session().document().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mode_exclusion_via_commands() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();

        orch.handle_command(Command::Secret).unwrap();
        let action = orch.handle_command(Command::Retry).unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("/endsecret")));
        assert!(orch.session().mode().is_secret());
        orch.handle_command(Command::EndSecret).unwrap();

        orch.handle_command(Command::Retry).unwrap();
        let action = orch.handle_command(Command::Secret).unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("/cancel")));
        assert!(orch.session().mode().is_retry());
    }

    #[test]
    fn test_apply_outside_retry_prints() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let action = orch.handle_command(Command::Apply(None)).unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("not active")));
    }

    #[test]
    fn test_error_message_is_redacted() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("hello").unwrap() else {
            panic!("expected send");
        };
        let error = ParleyError::Provider(ProviderError::Network(
            "401 for key sk-abc123def456ghi789jkl012".to_string(),
        ));
        orch.handle_ai_error(send.pending, &error).unwrap();
        let doc = orch.session().document().unwrap();
        let text = doc.messages[0].text();
        assert!(!text.contains("sk-abc123def456ghi789jkl012"));
        assert!(text.contains("[redacted]"));
    }

    #[test]
    fn test_provider_switch_resets_model() {
        let (mut orch, _dir) = orchestrator();
        orch.handle_command(Command::Provider(Some("openai".to_string())))
            .unwrap();
        assert_eq!(orch.session().provider_name(), "openai");
        assert_eq!(orch.session().model(), Settings::default().providers.openai.default_model);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (mut orch, _dir) = orchestrator();
        let action = orch
            .handle_command(Command::Provider(Some("nope".to_string())))
            .unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("unknown provider")));
        assert_eq!(orch.session().provider_name(), "mock");
    }

    #[tokio::test]
    async fn test_show_by_hex_id() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();
        let id = orch.session().document().unwrap().messages[0]
            .hex_id
            .clone()
            .unwrap();
        let action = orch.handle_command(Command::Show(Some(id))).unwrap();
        assert!(matches!(action, Action::Print(ref s) if s.contains("q1")));
    }

    #[tokio::test]
    async fn test_open_switch_discards_mode() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "a");
        let Action::Send(send) = orch.handle_input("q1").unwrap() else {
            panic!("expected send");
        };
        orch.handle_ai_response(send.pending, outcome("a1")).await.unwrap();
        orch.handle_command(Command::Retry).unwrap();

        open_chat(&mut orch, "b");
        assert!(orch.session().mode().is_normal());
        orch.handle_command(Command::Open("a".to_string())).unwrap();
        assert_eq!(orch.session().document().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_open_chat_closes_it() {
        let (mut orch, _dir) = orchestrator();
        open_chat(&mut orch, "t");
        orch.handle_command(Command::Delete("t".to_string())).unwrap();
        assert!(!orch.session().is_open());
    }
}
