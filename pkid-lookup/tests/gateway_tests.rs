//! Integration tests for the PassKit client against an in-process server
//!
//! Covers:
//! - Every known response envelope, plus an unrecognized one
//! - HTTP error classification and body truncation
//! - Transport failures (refused connection, timeout)
//! - Request format: path, headers, token claims, filter body

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use pkid_common::auth::{body_digest, decode, ClaimShape, HeaderStyle, TokenProvider, DEFAULT_TTL_SECS};
use pkid_common::config::Credentials;
use pkid_common::InputName;
use pkid_lookup::error::{GatewayError, UpstreamKind, BODY_EXCERPT_CHARS};
use pkid_lookup::models::MatchMode;
use pkid_lookup::services::envelope::EnvelopeShape;
use pkid_lookup::services::query_builder::build_filter;
use pkid_lookup::services::{MemberDirectory, PassKitClient};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "test-key";
const SECRET: &str = "test-secret";
const PROGRAM: &str = "prog-42";

/// Request as seen by the mock server
#[derive(Debug, Clone)]
struct Captured {
    program_id: String,
    headers: HeaderMap,
    body: Bytes,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    delay: Duration,
    captured: Arc<Mutex<Vec<Captured>>>,
}

async fn list_handler(
    State(state): State<MockState>,
    Path(program_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.captured.lock().unwrap().push(Captured {
        program_id,
        headers,
        body,
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, state.body.clone())
}

/// Start a mock list endpoint answering every request with `status`/`body`
async fn spawn_mock(status: StatusCode, body: &str, delay: Duration) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        body: body.to_string(),
        delay,
        captured: captured.clone(),
    };
    let app = Router::new()
        .route("/members/member/list/:program_id", post(list_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/", addr), captured)
}

fn client_for(base: &str, shape: ClaimShape, style: HeaderStyle, timeout: Duration) -> PassKitClient {
    let credentials = Credentials {
        api_key: KEY.to_string(),
        api_secret: SECRET.to_string(),
        program_id: PROGRAM.to_string(),
        api_base: base.to_string(),
    };
    let tokens = TokenProvider::new(KEY, SECRET, shape, style, DEFAULT_TTL_SECS).unwrap();
    PassKitClient::new(&credentials, tokens, timeout).unwrap()
}

fn default_client(base: &str) -> PassKitClient {
    client_for(base, ClaimShape::Standard, HeaderStyle::Bearer, Duration::from_secs(5))
}

fn request() -> pkid_lookup::services::query_builder::FilterRequest {
    let names: Vec<InputName> = ["alice smith", "bob lee"]
        .iter()
        .filter_map(|n| InputName::new(n))
        .collect();
    build_filter(&names, MatchMode::Exact, 1000, 0)
}

fn ids(records: &[pkid_lookup::MemberRecord]) -> Vec<&str> {
    records.iter().map(|r| r.member_id.as_str()).collect()
}

#[tokio::test]
async fn test_envelope_shapes() {
    let cases = [
        (
            r#"[{"id":"m1","person":{"displayName":"Alice Smith"}}]"#,
            EnvelopeShape::BareList,
        ),
        (
            r#"{"results":[{"id":"m1","person":{"displayName":"Alice Smith"}}]}"#,
            EnvelopeShape::KeyedList,
        ),
        (
            r#"{"response":{"members":[{"id":"m1","Person":{"display_name":"Alice Smith"}}]}}"#,
            EnvelopeShape::NestedResponse,
        ),
        (
            "{\"result\":{\"id\":\"m1\",\"person\":{\"displayName\":\"Alice Smith\"}}}\n{\"result\":{\"id\":\"m2\",\"person\":{\"displayName\":\"Bob Lee\"}}}\n",
            EnvelopeShape::Ndjson,
        ),
    ];

    for (body, shape) in cases {
        let (base, _) = spawn_mock(StatusCode::OK, body, Duration::ZERO).await;
        let page = default_client(&base).fetch_page(&request()).await.unwrap();

        assert_eq!(page.shape, Some(shape), "body {}", body);
        assert_eq!(page.records[0].member_id, "m1");
        assert_eq!(page.records[0].display_name, "Alice Smith");
    }
}

#[tokio::test]
async fn test_unrecognized_shape_is_empty_not_error() {
    let (base, _) = spawn_mock(StatusCode::OK, r#"{"status":"ok"}"#, Duration::ZERO).await;
    let client = default_client(&base);

    let page = client.fetch_page(&request()).await.unwrap();
    assert!(page.records.is_empty());
    assert!(page.shape_mismatch());

    let records = client.list_members(&request()).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let cases = [
        (StatusCode::UNAUTHORIZED, UpstreamKind::AuthFailure),
        (StatusCode::FORBIDDEN, UpstreamKind::AuthFailure),
        (StatusCode::NOT_FOUND, UpstreamKind::NotFound),
        (StatusCode::TOO_MANY_REQUESTS, UpstreamKind::Other),
        (StatusCode::INTERNAL_SERVER_ERROR, UpstreamKind::Other),
    ];

    for (status, expected_kind) in cases {
        let (base, _) = spawn_mock(status, "denied", Duration::ZERO).await;
        match default_client(&base).fetch_page(&request()).await {
            Err(GatewayError::Upstream {
                status: code,
                kind,
                body_excerpt,
            }) => {
                assert_eq!(code, status.as_u16());
                assert_eq!(kind, expected_kind);
                assert_eq!(body_excerpt, "denied");
            }
            other => panic!("status {}: unexpected {:?}", status, other),
        }
    }
}

#[tokio::test]
async fn test_error_body_is_truncated() {
    let long_body = "e".repeat(BODY_EXCERPT_CHARS * 3);
    let (base, _) = spawn_mock(StatusCode::BAD_GATEWAY, &long_body, Duration::ZERO).await;

    match default_client(&base).fetch_page(&request()).await {
        Err(GatewayError::Upstream { body_excerpt, .. }) => {
            assert_eq!(body_excerpt.chars().count(), BODY_EXCERPT_CHARS + 1);
            assert!(body_excerpt.ends_with('…'));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = default_client(&format!("http://{}", addr));
    let result = client.fetch_page(&request()).await;
    assert!(matches!(result, Err(GatewayError::Transport(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let (base, _) = spawn_mock(StatusCode::OK, "[]", Duration::from_secs(3)).await;
    let client = client_for(
        &base,
        ClaimShape::Standard,
        HeaderStyle::Bearer,
        Duration::from_millis(200),
    );

    match client.fetch_page(&request()).await {
        Err(GatewayError::Transport(detail)) => assert!(detail.contains("timed out"), "{}", detail),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_request_format_with_bearer_token() {
    let (base, captured) = spawn_mock(StatusCode::OK, "[]", Duration::ZERO).await;
    let client = default_client(&base);
    client.fetch_page(&request()).await.unwrap();
    client.fetch_page(&request()).await.unwrap();

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured.len(), 2);

    let first = &captured[0];
    assert_eq!(first.program_id, PROGRAM);
    assert_eq!(first.headers["content-type"], "application/json");

    let authorization = first.headers["authorization"].to_str().unwrap();
    let token = authorization.strip_prefix("Bearer ").unwrap();
    let claims = decode(token, SECRET).unwrap();
    assert_eq!(claims.iss.as_deref(), Some(KEY));
    assert_eq!(claims.exp - claims.iat, DEFAULT_TTL_SECS as i64);
    assert!(claims.signature.is_none());

    let body: Value = serde_json::from_slice(&first.body).unwrap();
    assert_eq!(body, serde_json::to_value(request()).unwrap());
    assert_eq!(body["filters"]["filterGroups"][0]["condition"], "OR");
}

#[tokio::test]
async fn test_signed_claims_with_bare_header() {
    let (base, captured) = spawn_mock(StatusCode::OK, "[]", Duration::ZERO).await;
    let client = client_for(&base, ClaimShape::Signed, HeaderStyle::Bare, Duration::from_secs(5));
    client.fetch_page(&request()).await.unwrap();

    let captured = captured.lock().unwrap().clone();
    let authorization = captured[0].headers["authorization"].to_str().unwrap();
    assert!(!authorization.starts_with("Bearer "));

    let claims = decode(authorization, SECRET).unwrap();
    assert_eq!(claims.uid.as_deref(), Some(KEY));
    assert!(claims.iss.is_none());
    assert_eq!(claims.signature, Some(body_digest(&captured[0].body)));
}

#[tokio::test]
async fn test_numeric_ids_and_missing_names() {
    let body = r#"{"members":[{"id":17,"person":{"displayName":"Ann"}},{"memberId":"m2"},{"person":{"displayName":"No Id"}}]}"#;
    let (base, _) = spawn_mock(StatusCode::OK, body, Duration::ZERO).await;

    let records = default_client(&base).list_members(&request()).await.unwrap();
    assert_eq!(ids(&records), ["17", "m2", ""]);
    assert_eq!(records[1].display_name, "");
}
