// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shared helpers
//!
//! Currently: credential redaction for error text that ends up persisted
//! in chat documents or printed to the terminal.

use std::sync::OnceLock;

use regex::Regex;

const REDACTED: &str = "[redacted]";

fn credential_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // key=value style assignments: api_key=..., token: ..., secret=...
            Regex::new(r#"(?i)\b(api[_-]?key|access[_-]?token|auth[_-]?token|token|secret|password)\b(\s*[=:]\s*)[^\s"'&]+"#)
                .expect("credential assignment pattern"),
            // Bearer tokens in header dumps
            Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/\-]+=*").expect("bearer pattern"),
            // Common provider key shapes (sk-..., AIza..., anthropic keys)
            Regex::new(r"\b(sk-[A-Za-z0-9_\-]{8,}|AIza[A-Za-z0-9_\-]{16,})\b")
                .expect("key shape pattern"),
        ]
    })
}

/// Strip credential-looking substrings from user-visible failure text.
///
/// Applied to every provider error before it is persisted as a document
/// error turn or printed by the REPL.
pub fn redact_credentials(text: &str) -> String {
    let patterns = credential_patterns();
    let mut out = patterns[0]
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], &caps[2], REDACTED)
        })
        .into_owned();
    out = patterns[1].replace_all(&out, REDACTED).into_owned();
    patterns[2].replace_all(&out, REDACTED).into_owned()
}

/// Truncate a string to `max` characters on a char boundary, appending an
/// ellipsis when anything was cut. Used for chat titles and summaries.
pub fn truncate_summary(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
