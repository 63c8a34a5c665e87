// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Redirect citation resolution
//!
//! Some providers return citation URLs that point at an intermediary
//! redirector (search-grounding endpoints) instead of the final source.
//! This module resolves those URLs with bounded-concurrency HTTP fetches:
//! GET then HEAD with redirects disabled, reading the `Location` header,
//! falling back to URL-decoding the destination out of the redirect URL
//! itself. Unresolved indirections become `url: null` rather than staying
//! pointed at the redirector.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::{Client, Url};
use tokio::sync::Semaphore;

use crate::citations::{dedupe_and_number, Citation};
use crate::error::Result;

/// Default cap on concurrent resolution fetches
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Hosts known to be citation redirectors
const REDIRECT_HOSTS: &[&str] = &["vertexaisearch.cloud.google.com"];

/// Query parameters that may carry the redirect destination
const DESTINATION_PARAMS: &[&str] = &["url", "q", "u", "target", "dest", "destination"];

/// Resolves redirect-style citation URLs to their destinations.
pub struct RedirectResolver {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl RedirectResolver {
    /// Create a resolver with the default concurrency bound and timeout.
    pub fn new() -> Result<Self> {
        Self::with_limits(DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT)
    }

    /// Create a resolver with explicit limits.
    pub fn with_limits(max_concurrent: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// Whether a URL looks like a citation redirector, by host/path
    /// heuristic. Only matching citations are fetched at all.
    pub fn is_redirect_url(raw: &str) -> bool {
        let Ok(url) = Url::parse(raw) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        if REDIRECT_HOSTS.contains(&host) {
            return true;
        }
        let path = url.path().to_lowercase();
        if host.ends_with("google.com") && path == "/url" {
            return true;
        }
        if path.contains("redirect") {
            return true;
        }
        // Generic /url endpoints only count when a destination param rides along.
        if path.ends_with("/url") && Self::destination_from_query(&url).is_some() {
            return true;
        }
        false
    }

    /// Resolve every redirect-style citation in the list, then re-run the
    /// dedupe and numbering pass. Order is preserved; citations that fail
    /// to resolve keep their entry with `url: null`.
    pub async fn resolve_all(&self, citations: Vec<Citation>) -> Vec<Citation> {
        let tasks = citations.into_iter().map(|mut citation| async {
            let needs_resolution = citation
                .url
                .as_deref()
                .is_some_and(Self::is_redirect_url);
            if needs_resolution {
                // Closing the semaphore is not part of this type's lifecycle,
                // so acquire can only fail if poisoned by a bug.
                let _permit = self.semaphore.acquire().await.expect("semaphore closed");
                let original = citation.url.take().unwrap_or_default();
                citation.url = self.resolve_one(&original).await;
                tracing::debug!(
                    target: "parley.citations",
                    original = %original,
                    resolved = citation.url.as_deref().unwrap_or("<none>"),
                    "redirect citation resolved"
                );
            }
            citation
        });

        let resolved = futures::future::join_all(tasks).await;
        dedupe_and_number(resolved)
    }

    /// Resolve a single redirect URL, or None when every strategy fails.
    async fn resolve_one(&self, raw: &str) -> Option<String> {
        let url = Url::parse(raw).ok()?;

        if let Some(destination) = self.fetch_location(&url, false).await {
            return Some(destination);
        }
        if let Some(destination) = self.fetch_location(&url, true).await {
            return Some(destination);
        }
        Self::destination_from_url(&url)
    }

    /// Issue a GET (or HEAD) without following redirects and read the
    /// `Location` header, resolved against the request URL.
    async fn fetch_location(&self, url: &Url, head: bool) -> Option<String> {
        let request = if head {
            self.client.head(url.clone())
        } else {
            self.client.get(url.clone())
        };
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(
                    target: "parley.citations",
                    url = %url,
                    head,
                    error = %err,
                    "redirect fetch failed"
                );
                return None;
            }
        };

        let location = response.headers().get(LOCATION)?.to_str().ok()?;
        url.join(location).ok().map(String::from)
    }

    /// Parse the destination out of the redirect URL itself: a known query
    /// parameter first, then the percent-decoded trailing path segment.
    fn destination_from_url(url: &Url) -> Option<String> {
        if let Some(destination) = Self::destination_from_query(url) {
            return Some(destination);
        }

        let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
        let decoded = percent_decode(segment);
        parse_http_url(&decoded)
    }

    fn destination_from_query(url: &Url) -> Option<String> {
        url.query_pairs()
            .find(|(key, value)| {
                DESTINATION_PARAMS.contains(&key.as_ref()) && parse_http_url(value).is_some()
            })
            .map(|(_, value)| value.into_owned())
    }
}

fn parse_http_url(candidate: &str) -> Option<String> {
    let parsed = Url::parse(candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str()?;
    Some(candidate.to_string())
}

/// Minimal percent-decoding for path segments. Invalid escapes pass
/// through unchanged.
fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
