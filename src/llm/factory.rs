// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider construction and caching
//!
//! Credential preflight happens here, before any network call: a missing
//! key env var is a `ProviderError::Preflight` that the orchestrator rolls
//! back without touching the network. Instances are cached per (name,
//! credential, timeout) and are stateless with respect to session data, so
//! the cache is an optimization only.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{ProviderError, Result};
use crate::llm::mock::MockProvider;
use crate::llm::provider::ChatProvider;

/// Context handed to a provider builder.
pub struct ProviderContext {
    /// Resolved API credential (empty for providers that need none)
    pub credential: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

type ProviderBuilder = Arc<dyn Fn(ProviderContext) -> Result<Arc<dyn ChatProvider>> + Send + Sync>;

/// Builds and caches provider instances from settings.
pub struct ProviderFactory {
    settings: Settings,
    builders: HashMap<String, ProviderBuilder>,
    cache: HashMap<(String, String, u64), Arc<dyn ChatProvider>>,
}

impl ProviderFactory {
    /// Create a factory with the built-in provider set registered.
    pub fn new(settings: Settings) -> Self {
        let mut factory = Self {
            settings,
            builders: HashMap::new(),
            cache: HashMap::new(),
        };
        factory.register("mock", |_ctx| Ok(Arc::new(MockProvider::new()) as Arc<dyn ChatProvider>));
        factory
    }

    /// Register a builder for a provider name. Provider SDK crates hook in
    /// here; the orchestrator never sees anything but the trait.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(ProviderContext) -> Result<Arc<dyn ChatProvider>> + Send + Sync + 'static,
    {
        self.builders.insert(name.to_string(), Arc::new(builder));
    }

    /// Whether a backend is registered for this provider name.
    pub fn supports(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Validate credentials and return a (possibly cached) provider.
    pub fn get(&mut self, name: &str) -> Result<Arc<dyn ChatProvider>> {
        let credential = self.preflight(name)?;
        let timeout_secs = self.settings.request_timeout_secs;

        let key = (name.to_string(), credential.clone(), timeout_secs);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let builder = self.builders.get(name).ok_or_else(|| {
            ProviderError::Preflight(format!("no backend registered for provider '{}'", name))
        })?;
        let provider = builder(ProviderContext {
            credential,
            timeout_secs,
        })?;

        tracing::debug!(
            target: "parley.llm.factory",
            provider = name,
            timeout_secs,
            "provider instance created"
        );
        self.cache.insert(key, provider.clone());
        Ok(provider)
    }

    /// Credential preflight: resolve the configured env var without
    /// touching the network. Returns the credential for cache keying.
    pub fn preflight(&self, name: &str) -> Result<String> {
        let config = self.settings.provider(name).ok_or_else(|| {
            ProviderError::Preflight(format!("unknown provider '{}'", name))
        })?;

        if config.api_key_env.is_empty() {
            return Ok(String::new());
        }
        match std::env::var(&config.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ProviderError::Preflight(format!(
                "{} is not set (required for provider '{}')",
                config.api_key_env, name
            ))
            .into()),
        }
    }

    /// Default model for a provider, from settings.
    pub fn default_model(&self, name: &str) -> Option<String> {
        self.settings
            .provider(name)
            .map(|c| c.default_model.clone())
    }
}
