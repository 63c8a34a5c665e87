// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Parley
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Parley operations
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Provider request errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session/document state errors
    #[error("Session error: {0}")]
    Session(String),

    /// Structural errors (stale retry target, unknown hex id)
    #[error("{0}")]
    Structural(String),

    /// Citation resolution errors (non-fatal at the turn level)
    #[error("Citation resolution failed: {0}")]
    CitationResolution(String),

    /// Chat store errors
    #[error("Store error: {0}")]
    Store(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Provider-level error taxonomy
///
/// `Preflight` is detected before any network call and rolls back via
/// `rollback_pre_send_failure`; everything else is a terminal request
/// outcome surfaced after the provider's own retries are exhausted.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Missing or invalid credentials, or provider misconfiguration
    #[error("Preflight validation failed: {0}")]
    Preflight(String),

    /// Authentication rejected by the provider
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited after the provider's own retries were exhausted
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned an error status
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for a response
    #[error("Request timed out")]
    Timeout,

    /// Streaming terminated abnormally
    #[error("Streaming error: {0}")]
    Stream(String),
}

impl ProviderError {
    /// Whether this error was raised before any network call was made.
    pub fn is_preflight(&self) -> bool {
        matches!(self, ProviderError::Preflight(_))
    }
}

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;
