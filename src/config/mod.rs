// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings and on-disk layout
//!
//! Settings live at `~/.parley/settings.json` (overridable via the
//! `PARLEY_HOME` environment variable). Chat documents live under
//! `~/.parley/chats/`. Loading a missing settings file yields defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Provider selected when no `--provider` flag is given
    pub default_provider: String,

    /// Per-provider configuration
    pub providers: ProviderSettings,

    /// Request timeout in seconds for provider calls
    pub request_timeout_secs: u64,

    /// Citation post-processing options
    pub citations: CitationSettings,
}

/// Configuration blocks for each supported provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
    pub mock: ProviderConfig,
}

/// Settings for a single provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Model used when the session does not override it
    pub default_model: String,
}

/// Citation normalization / resolution options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationSettings {
    /// Whether to resolve redirect-style citation URLs over HTTP
    pub resolve_redirects: bool,

    /// Maximum concurrent resolution requests
    pub max_concurrent_resolves: usize,

    /// Per-request timeout for resolution fetches, in seconds
    pub resolve_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: "anthropic".to_string(),
            providers: ProviderSettings::default(),
            request_timeout_secs: 120,
            citations: CitationSettings::default(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            anthropic: ProviderConfig {
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                default_model: "claude-sonnet-4-20250514".to_string(),
            },
            openai: ProviderConfig {
                api_key_env: "OPENAI_API_KEY".to_string(),
                default_model: "gpt-4o".to_string(),
            },
            gemini: ProviderConfig {
                api_key_env: "GEMINI_API_KEY".to_string(),
                default_model: "gemini-2.0-flash".to_string(),
            },
            mock: ProviderConfig {
                api_key_env: String::new(),
                default_model: "mock-model".to_string(),
            },
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key_env: String::new(),
            default_model: String::new(),
        }
    }
}

impl Default for CitationSettings {
    fn default() -> Self {
        Self {
            resolve_redirects: true,
            max_concurrent_resolves: 4,
            resolve_timeout_secs: 5,
        }
    }
}

impl Settings {
    /// Get the parley home directory (~/.parley or $PARLEY_HOME).
    pub fn parley_home() -> PathBuf {
        if let Ok(home) = std::env::var("PARLEY_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parley")
    }

    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::parley_home().join("settings.json")
    }

    /// Get the chat documents directory.
    pub fn chats_dir() -> PathBuf {
        Self::parley_home().join("chats")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path, defaulting when the file is
    /// missing.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up the configuration block for a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "anthropic" => Some(&self.providers.anthropic),
            "openai" => Some(&self.providers.openai),
            "gemini" => Some(&self.providers.gemini),
            "mock" => Some(&self.providers.mock),
            _ => None,
        }
    }
}
