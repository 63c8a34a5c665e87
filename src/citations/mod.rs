// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Citation normalization
//!
//! Providers return citation records in loose shapes: `{url, title}` maps
//! or bare URL strings, with noisy titles and duplicate URLs that differ
//! only by fragment or trailing slash. This module cleans, validates,
//! deduplicates, and numbers them. Redirect-style URLs are resolved
//! separately by [`resolver::RedirectResolver`].

pub mod resolver;

pub use resolver::RedirectResolver;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// A normalized citation. Field order is part of the persisted shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in survival order
    pub number: u32,

    /// Cleaned title, if the provider sent a real one
    pub title: Option<String>,

    /// Validated http(s) URL, or None when unusable
    pub url: Option<String>,
}

/// A citation record as received from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCitation {
    /// Bare URL string
    Url(String),
    /// Structured record
    Record {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
}

impl From<Citation> for RawCitation {
    fn from(citation: Citation) -> Self {
        RawCitation::Record {
            url: citation.url,
            title: citation.title,
        }
    }
}

/// Normalize a raw citation list: clean titles, validate URLs, dedupe,
/// and number sequentially. Idempotent.
pub fn normalize<I, R>(raw: I) -> Vec<Citation>
where
    I: IntoIterator<Item = R>,
    R: Into<RawCitation>,
{
    let cleaned: Vec<Citation> = raw
        .into_iter()
        .map(|record| clean_record(record.into()))
        .collect();
    dedupe_and_number(cleaned)
}

/// Deduplicate in order and renumber from 1. Re-run after redirect
/// resolution, which can create new duplicates or new nulls.
pub fn dedupe_and_number(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen: Vec<(Option<String>, Option<String>)> = Vec::new();
    let mut out: Vec<Citation> = Vec::new();

    for citation in citations {
        let key = (
            citation.url.as_deref().map(canonical_url_key),
            citation.title.as_ref().map(|t| t.to_lowercase()),
        );
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(citation);
    }

    for (i, citation) in out.iter_mut().enumerate() {
        citation.number = (i + 1) as u32;
    }
    out
}

fn clean_record(raw: RawCitation) -> Citation {
    let (url, title) = match raw {
        RawCitation::Url(url) => (Some(url), None),
        RawCitation::Record { url, title } => (url, title),
    };

    let url = url.and_then(|u| validate_url(&u));
    let title = title.and_then(|t| clean_title(t, url.as_deref()));

    Citation {
        number: 0,
        title,
        url,
    }
}

/// Only http/https URLs with a non-empty host survive validation.
fn validate_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return None;
    }
    Some(raw.trim().to_string())
}

/// Drop titles that carry no information: purely numeric strings, and
/// host-like strings that just repeat the citation's own URL host.
fn clean_title(title: String, url: Option<&str>) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    if let Some(title_host) = as_host_like(trimmed) {
        if let Some(url_host) = url
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| strip_www(h).to_string()))
        {
            if hosts_related(&title_host, &url_host) {
                return None;
            }
        }
    }

    Some(trimmed.to_string())
}

/// Reduce a title to a hostname candidate, or None when it cannot be one.
fn as_host_like(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    let lower = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let lower = lower.trim_end_matches('/');
    if lower.contains(char::is_whitespace) || !lower.contains('.') {
        return None;
    }
    if !lower
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
    {
        return None;
    }
    Some(strip_www(lower).to_string())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Exact match, or one host is a subdomain of the other.
fn hosts_related(a: &str, b: &str) -> bool {
    a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a))
}

/// Dedupe key: fragment stripped, trailing slash removed, lowercased.
fn canonical_url_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.as_str().trim_end_matches('/').to_lowercase()
        }
        Err(_) => url.trim_end_matches('/').to_lowercase(),
    }
}
