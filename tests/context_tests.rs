//! Request-context plumbing: lazy caches, body accumulation with limits,
//! cookie and credential parsing, and response staging.
//!
//! The cache accessors populate on first access and are not re-entered
//! during population; each request is confined to a single coroutine, so
//! the caches need no locking.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::Method;
use restflow::dispatch::{BodyError, RequestContext, RequestHead};
use restflow::registry::HandlerRegistry;
use serde_json::json;

mod tracing_util;
use tracing_util::TestTracing;

fn test_head(headers: &[(&str, &str)]) -> RequestHead {
    RequestHead {
        method: Method::POST,
        path: "/things".to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        query_params: HashMap::new(),
    }
}

fn context_with_body(headers: &[(&str, &str)], body: &[u8]) -> RequestContext {
    RequestContext::new(
        Arc::new(HandlerRegistry::new()),
        test_head(headers),
        Box::new(Cursor::new(body.to_vec())),
    )
}

/// Reader that counts how often the transport is touched.
struct CountingReader {
    data: Cursor<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.read(buf)
    }
}

#[test]
fn cookies_split_and_percent_decode() {
    let ctx = context_with_body(&[("cookie", "a=1; b=hello%20world")], b"");
    let cookies = ctx.cookies();
    assert_eq!(cookies.get("a"), Some(&"1".to_string()));
    assert_eq!(cookies.get("b"), Some(&"hello world".to_string()));
    assert_eq!(ctx.cookie("b"), Some("hello world"));
    assert_eq!(ctx.cookie("missing"), None);
}

#[test]
fn cookies_populate_once() {
    let ctx = context_with_body(&[("cookie", "a=1")], b"");
    let first = ctx.cookies() as *const _;
    let second = ctx.cookies() as *const _;
    assert!(std::ptr::eq(first, second));
}

#[test]
fn basic_auth_decodes_credentials() {
    let header = format!("Basic {}", BASE64.encode("alice:s3cret"));
    let ctx = context_with_body(&[("authorization", header.as_str())], b"");
    let creds = ctx.basic_auth().expect("credentials");
    assert_eq!(creds.scheme, "Basic");
    assert_eq!(creds.username, "alice");
    assert_eq!(creds.password, "s3cret");
}

#[test]
fn basic_auth_is_none_without_header() {
    let ctx = context_with_body(&[], b"");
    assert!(ctx.basic_auth().is_none());
}

#[test]
fn request_header_lookup_is_case_insensitive() {
    let ctx = context_with_body(&[("x-custom", "42")], b"");
    assert_eq!(ctx.request_header("X-Custom"), Some("42"));
    assert_eq!(ctx.request_header("x-custom"), Some("42"));
    assert_eq!(ctx.request_header("x-other"), None);
}

#[test]
fn body_is_cached_after_the_first_read() {
    let _tracing = TestTracing::init();
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = CountingReader {
        data: Cursor::new(b"hello body".to_vec()),
        reads: Arc::clone(&reads),
    };
    let ctx = RequestContext::new(
        Arc::new(HandlerRegistry::new()),
        test_head(&[]),
        Box::new(reader),
    );

    let mut seen = None;
    ctx.read_body(None, |outcome| {
        seen = outcome.ok().flatten().map(str::to_string);
    });
    assert_eq!(seen.as_deref(), Some("hello body"));

    let reads_after_first = reads.load(Ordering::SeqCst);
    assert!(reads_after_first > 0);

    // second read replays the cache without touching the transport
    let mut seen_again = None;
    ctx.read_body(None, |outcome| {
        seen_again = outcome.ok().flatten().map(str::to_string);
    });
    assert_eq!(seen_again.as_deref(), Some("hello body"));
    assert_eq!(reads.load(Ordering::SeqCst), reads_after_first);
}

#[test]
fn body_over_limit_errors_and_poisons_the_cache() {
    let _tracing = TestTracing::init();
    let ctx = context_with_body(&[], b"0123456789");

    let mut got_error = false;
    let mut got_payload = false;
    ctx.read_body(Some(5), |outcome| match outcome {
        Err(BodyError::LimitExceeded { reached, limit }) => {
            assert!(reached > limit);
            assert_eq!(limit, 5);
            got_error = true;
        }
        Ok(_) => got_payload = true,
        Err(other) => panic!("unexpected error: {other}"),
    });
    assert!(got_error);
    assert!(!got_payload);

    // the cache is poisoned: the body is gone, not retried
    ctx.read_body(None, |outcome| {
        assert_eq!(outcome.unwrap(), None);
    });
}

#[test]
fn json_body_parses_and_caches() {
    let ctx = context_with_body(&[], br#"{"name":"Bella","age":3}"#);

    let mut first = None;
    ctx.read_json_body(None, |outcome| {
        first = outcome.unwrap().cloned();
    });
    assert_eq!(first, Some(json!({ "name": "Bella", "age": 3 })));

    // second call replays the parsed value
    ctx.read_json_body(None, |outcome| {
        assert_eq!(outcome.unwrap().cloned(), first);
    });
}

#[test]
fn json_body_parse_failure_is_reported() {
    let ctx = context_with_body(&[], b"not json at all");

    ctx.read_json_body(None, |outcome| {
        assert!(matches!(outcome, Err(BodyError::Parse(_))));
    });

    // the raw text survives a parse failure
    ctx.read_body(None, |outcome| {
        assert_eq!(outcome.unwrap(), Some("not json at all"));
    });
}

#[test]
fn empty_body_yields_none_for_json() {
    let ctx = context_with_body(&[], b"");
    ctx.read_json_body(None, |outcome| {
        assert_eq!(outcome.unwrap(), None);
    });
}

#[test]
fn json_body_honors_the_raw_body_limit() {
    let ctx = context_with_body(&[], br#"{"key":"a rather long value"}"#);
    ctx.read_json_body(Some(5), |outcome| {
        assert!(matches!(outcome, Err(BodyError::LimitExceeded { .. })));
    });
}

#[test]
fn response_headers_stage_until_finish() {
    let ctx = context_with_body(&[], b"");
    ctx.set_response_header("x-trace", "abc".to_string());
    assert_eq!(ctx.response_header("X-Trace"), Some("abc".to_string()));
    assert!(!ctx.is_closed());

    ctx.send_with_status(201, json!({ "created": true }));
    assert!(ctx.is_closed());
    assert_eq!(ctx.response().status(), 201);
    assert_eq!(
        ctx.response_header("content-type"),
        Some("application/json".to_string())
    );
}

#[test]
fn send_keeps_an_explicit_content_type() {
    let ctx = context_with_body(&[], b"");
    ctx.set_response_header("content-type", "application/problem+json".to_string());
    ctx.send(json!({ "title": "oops" }));
    assert_eq!(
        ctx.response_header("content-type"),
        Some("application/problem+json".to_string())
    );
}

#[test]
fn error_defaults_to_500_and_reports_the_message() {
    let _tracing = TestTracing::init();
    let ctx = context_with_body(&[], b"");
    ctx.error(anyhow::anyhow!("backend unavailable"));
    assert!(ctx.is_closed());
    assert_eq!(ctx.response().status(), 500);
}

#[test]
fn error_with_status_uses_the_staged_status() {
    let _tracing = TestTracing::init();
    let ctx = context_with_body(&[], b"");
    ctx.error_with_status(403, anyhow::anyhow!("forbidden"));
    assert_eq!(ctx.response().status(), 403);
}

#[test]
fn query_params_are_exposed() {
    let mut head = test_head(&[]);
    head.query_params
        .insert("limit".to_string(), "10".to_string());
    let ctx = RequestContext::new(
        Arc::new(HandlerRegistry::new()),
        head,
        Box::new(Cursor::new(Vec::new())),
    );
    assert_eq!(ctx.query_param("limit"), Some("10"));
    assert_eq!(ctx.query_param("offset"), None);
}
