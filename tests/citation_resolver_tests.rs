// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Redirect resolution against a local HTTP server: Location-header
//! resolution, the GET-then-HEAD fallback, URL-embedded destinations,
//! unresolved indirections, and the post-resolution dedupe pass.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::citations::{Citation, RedirectResolver};

fn citation(number: u32, title: Option<&str>, url: &str) -> Citation {
    Citation {
        number,
        title: title.map(str::to_string),
        url: Some(url.to_string()),
    }
}

fn resolver() -> RedirectResolver {
    RedirectResolver::with_limits(4, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_location_header_resolution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect/a"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://final.example/doc"),
        )
        .mount(&server)
        .await;

    let input = vec![citation(1, Some("Doc"), &format!("{}/redirect/a", server.uri()))];
    let resolved = resolver().resolve_all(input).await;

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].url.as_deref(), Some("https://final.example/doc"));
    assert_eq!(resolved[0].title.as_deref(), Some("Doc"));
    assert_eq!(resolved[0].number, 1);
}

#[tokio::test]
async fn test_relative_location_resolved_against_request_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect/rel"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/articles/42"))
        .mount(&server)
        .await;

    let input = vec![citation(1, None, &format!("{}/redirect/rel", server.uri()))];
    let resolved = resolver().resolve_all(input).await;

    assert_eq!(
        resolved[0].url.as_deref(),
        Some(format!("{}/articles/42", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_head_fallback_when_get_has_no_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/redirect/b"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://head.example/page"),
        )
        .mount(&server)
        .await;

    let input = vec![citation(1, None, &format!("{}/redirect/b", server.uri()))];
    let resolved = resolver().resolve_all(input).await;

    assert_eq!(resolved[0].url.as_deref(), Some("https://head.example/page"));
}

#[tokio::test]
async fn test_query_param_fallback_without_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/redirect"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!(
        "{}/redirect?url=https%3A%2F%2Fparam.example%2Fdest",
        server.uri()
    );
    let resolved = resolver().resolve_all(vec![citation(1, None, &url)]).await;

    assert_eq!(
        resolved[0].url.as_deref(),
        Some("https://param.example/dest")
    );
}

#[tokio::test]
async fn test_unresolvable_redirect_becomes_null_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect/opaque"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/redirect/opaque"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let input = vec![
        citation(1, Some("Kept"), &format!("{}/redirect/opaque", server.uri())),
        citation(2, Some("Plain"), "https://example.com/stays"),
    ];
    let resolved = resolver().resolve_all(input).await;

    // The unresolved citation survives with url: null; the plain one is
    // untouched and never fetched.
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].title.as_deref(), Some("Kept"));
    assert_eq!(resolved[0].url, None);
    assert_eq!(resolved[1].url.as_deref(), Some("https://example.com/stays"));
}

#[tokio::test]
async fn test_resolution_reruns_dedupe_and_numbering() {
    let server = MockServer::start().await;
    for p in ["/redirect/x", "/redirect/y"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "https://same.example/doc"),
            )
            .mount(&server)
            .await;
    }

    let input = vec![
        citation(1, Some("One"), &format!("{}/redirect/x", server.uri())),
        citation(2, Some("One"), &format!("{}/redirect/y", server.uri())),
        citation(3, Some("Other"), "https://other.example/"),
    ];
    let resolved = resolver().resolve_all(input).await;

    // Both redirects landed on the same destination; the duplicate is
    // dropped and the rest renumbered from 1.
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].url.as_deref(), Some("https://same.example/doc"));
    assert_eq!(resolved[0].number, 1);
    assert_eq!(resolved[1].number, 2);
}

#[tokio::test]
async fn test_order_preserved_under_concurrency() {
    let server = MockServer::start().await;
    for (p, dest, delay) in [
        ("/redirect/slow", "https://slow.example/", 150u64),
        ("/redirect/fast", "https://fast.example/", 0),
    ] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", dest)
                    .set_delay(Duration::from_millis(delay)),
            )
            .mount(&server)
            .await;
    }

    let input = vec![
        citation(1, None, &format!("{}/redirect/slow", server.uri())),
        citation(2, None, &format!("{}/redirect/fast", server.uri())),
    ];
    let resolved = resolver().resolve_all(input).await;

    assert_eq!(resolved[0].url.as_deref(), Some("https://slow.example/"));
    assert_eq!(resolved[1].url.as_deref(), Some("https://fast.example/"));
}
