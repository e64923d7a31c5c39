mod auth_support;

use std::sync::Arc;

use authctx::auth::{
    AuthError, AuthProvider, DeviceCodePoll, DeviceCodeRequest, DeviceCodeRequester,
    DeviceCodeSession, SilentProgress, TokenEndpoint, TokenPoller,
};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{
    token_error, token_success, RecordingProgress, CLIENT_ID, CODE_PATH, JWKS_PATH, TOKEN_PATH,
};

fn provider(server: &MockServer) -> AuthProvider {
    AuthProvider {
        id: "p1".to_string(),
        login_url: format!("{}/authorize", server.uri()),
        token_url: format!("{}{TOKEN_PATH}", server.uri()),
        code_url: format!("{}{CODE_PATH}", server.uri()),
        jwks_url: format!("{}{JWKS_PATH}", server.uri()),
        client_id: CLIENT_ID.to_string(),
    }
}

fn session(interval_secs: u64, lifetime: Duration) -> DeviceCodeSession {
    let issued_at = Utc::now();
    DeviceCodeSession {
        device_code: "dc-1".to_string(),
        user_code: "ABCD-EFGH".to_string(),
        verification_url: "https://login.example/activate".to_string(),
        verification_url_complete: None,
        expires_in: lifetime.num_seconds(),
        interval_secs,
        issued_at,
        expires_at: issued_at + lifetime,
    }
}

/// Client without idle pooling, so paused-clock tests have no stray timers.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .expect("client")
}

fn poller() -> TokenPoller {
    TokenPoller::new(TokenEndpoint::new(client()), Arc::new(SilentProgress))
}

async fn mount_token_reply(server: &MockServer, status: u16, body: serde_json::Value, times: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("device_code=dc-1"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn request_device_code_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CODE_PATH))
        .and(header("accept", "application/json"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("scope=openid+profile+email+offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://login.example/activate",
            "verification_uri_complete": "https://login.example/activate?user_code=ABCD-EFGH",
            "expires_in": 900,
            "interval": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let request = DeviceCodeRequest::new(&provider, "https://api.example/");
    let session = DeviceCodeRequester::new(reqwest::Client::new())
        .request(&provider, &request)
        .await
        .expect("device code");

    assert_eq!(session.device_code, "dc-1");
    assert_eq!(session.user_code, "ABCD-EFGH");
    assert_eq!(session.interval_secs, 5);
    assert_eq!(session.expires_in, 900);
    assert_eq!(
        session.display_url(),
        "https://login.example/activate?user_code=ABCD-EFGH"
    );
    assert_eq!(session.expires_at - session.issued_at, Duration::seconds(900));
}

#[tokio::test]
async fn request_device_code_non_200_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CODE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "unauthorized_client"})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let err = DeviceCodeRequester::new(reqwest::Client::new())
        .request(&provider, &DeviceCodeRequest::new(&provider, "aud"))
        .await
        .unwrap_err();

    match err {
        AuthError::Protocol(message) => assert!(message.contains("401"), "{message}"),
        other => panic!("expected Protocol, got {other:?}"),
    }
}

#[tokio::test]
async fn request_device_code_bad_json_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let err = DeviceCodeRequester::new(reqwest::Client::new())
        .request(&provider, &DeviceCodeRequest::new(&provider, "aud"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn request_device_code_out_of_range_lifetime_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://login.example/activate",
            "expires_in": i64::MAX,
            "interval": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let err = DeviceCodeRequester::new(reqwest::Client::new())
        .request(&provider, &DeviceCodeRequest::new(&provider, "aud"))
        .await
        .unwrap_err();

    match err {
        AuthError::Protocol(message) => assert!(message.contains("lifetime"), "{message}"),
        other => panic!("expected Protocol, got {other:?}"),
    }
}

#[tokio::test]
async fn request_device_code_requires_code_endpoint() {
    let server = MockServer::start().await;
    let mut provider = provider(&server);
    provider.code_url.clear();

    let err = DeviceCodeRequester::new(reqwest::Client::new())
        .request(&provider, &DeviceCodeRequest::new(&provider, "aud"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn poll_pending_keeps_interval() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 403, token_error("authorization_pending"), 1).await;

    let result = poller()
        .poll_once(&provider(&server), &session(7, Duration::minutes(10)))
        .await
        .expect("pending");

    assert!(matches!(result, DeviceCodePoll::Pending { interval_secs: 7 }));
}

#[tokio::test]
async fn poll_slow_down_doubles_interval() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 200, token_error("slow_down"), 1).await;

    let result = poller()
        .poll_once(&provider(&server), &session(5, Duration::minutes(10)))
        .await
        .expect("slow down");

    assert!(matches!(result, DeviceCodePoll::SlowDown { interval_secs: 10 }));
}

#[tokio::test(start_paused = true)]
async fn wait_for_tokens_succeeds_after_pending_polls() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 403, token_error("authorization_pending"), 3).await;
    mount_token_reply(&server, 200, token_success("AT1", Some("RT1"), None), 1).await;

    let mut session = session(0, Duration::minutes(10));
    let response = poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .expect("tokens");

    assert_eq!(response.access_token, "AT1");
    assert_eq!(response.expires_in, 3600);
    assert_eq!(response.refresh_token.as_deref(), Some("RT1"));
}

#[tokio::test(start_paused = true)]
async fn wait_for_tokens_adopts_doubled_interval() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 200, token_error("slow_down"), 1).await;
    mount_token_reply(&server, 200, token_success("AT1", None, None), 1).await;

    let mut session = session(1, Duration::minutes(10));
    poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .expect("tokens");

    assert_eq!(session.interval_secs, 2);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_still_waits_between_polls() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 403, token_error("authorization_pending"), 2).await;
    mount_token_reply(&server, 200, token_success("AT1", None, None), 1).await;

    let started = tokio::time::Instant::now();
    let mut session = session(0, Duration::minutes(10));
    poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .expect("tokens");

    assert!(
        started.elapsed() >= std::time::Duration::from_secs(2),
        "{:?}",
        started.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn remaining_time_is_reported_once_per_minute() {
    let server = MockServer::start().await;
    // Polls at 0s, 5s, .. 60s stay pending; the one at 65s succeeds.
    mount_token_reply(&server, 403, token_error("authorization_pending"), 13).await;
    mount_token_reply(&server, 200, token_success("AT1", None, None), 1).await;

    let progress = Arc::new(RecordingProgress::default());
    let poller = TokenPoller::new(TokenEndpoint::new(client()), progress.clone());
    let mut session = session(5, Duration::minutes(10));
    poller
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .expect("tokens");

    assert_eq!(progress.events(), vec!["remaining 540".to_string()]);
}

#[tokio::test]
async fn terminal_poll_errors_stop_immediately() {
    let cases: [(&str, fn(&AuthError) -> bool); 3] = [
        ("expired_token", |e| matches!(e, AuthError::LoginTimedOut)),
        ("access_denied", |e| matches!(e, AuthError::AccessDenied)),
        ("invalid_grant", |e| matches!(e, AuthError::InvalidCredentials)),
    ];

    for (code, expected) in cases {
        let server = MockServer::start().await;
        mount_token_reply(&server, 403, token_error(code), 1).await;

        let mut session = session(0, Duration::minutes(10));
        let err = poller()
            .wait_for_tokens(&provider(&server), &mut session)
            .await
            .unwrap_err();

        assert!(expected(&err), "{code}: {err:?}");
        server.verify().await;
    }
}

#[tokio::test]
async fn unexpected_poll_status_is_protocol_error() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 500, json!({"error": "server_error"}), 1).await;

    let mut session = session(0, Duration::minutes(10));
    let err = poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .unwrap_err();

    match err {
        AuthError::Protocol(message) => assert!(message.contains("500"), "{message}"),
        other => panic!("expected Protocol, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_poll_error_code_is_protocol_error() {
    let server = MockServer::start().await;
    mount_token_reply(&server, 403, token_error("temporarily_unavailable"), 1).await;

    let mut session = session(0, Duration::minutes(10));
    let err = poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn expired_device_code_is_never_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_success("AT1", None, None)))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = session(0, Duration::seconds(-1));
    let err = poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::LoginTimedOut), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn local_deadline_ends_polling_without_server_signal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(token_error("authorization_pending")))
        .mount(&server)
        .await;

    let started = tokio::time::Instant::now();
    let mut session = session(30, Duration::seconds(1));
    let err = poller()
        .wait_for_tokens(&provider(&server), &mut session)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::LoginTimedOut), "{err:?}");
    assert!(started.elapsed() <= std::time::Duration::from_secs(1));
}
