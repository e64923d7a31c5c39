#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use authctx::auth::{AuthError, DeviceCodeSession, ProgressSink};
use authctx::config::{Context, ContextStore, Settings};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "client-1";
pub const SIGNING_KEY_ID: &str = "test-key";
pub const SIGNING_SECRET: &[u8] = b"identity-token-signing-secret";

pub const CODE_PATH: &str = "/oauth/device/code";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Context store held in memory with the same revision check as the file store.
#[derive(Default)]
pub struct InMemoryContextStore {
    contexts: Mutex<HashMap<String, Context>>,
    active: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `context` as-is (revision untouched) and make it active.
    pub fn seed(&self, context: Context) {
        *self.active.lock().expect("store lock poisoned") = Some(context.name.clone());
        self.contexts
            .lock()
            .expect("store lock poisoned")
            .insert(context.name.clone(), context);
    }

    pub fn get(&self, name: &str) -> Option<Context> {
        self.contexts
            .lock()
            .expect("store lock poisoned")
            .get(name)
            .cloned()
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ContextStore for InMemoryContextStore {
    fn load(&self, name: &str) -> Result<Option<Context>, AuthError> {
        Ok(self.get(name))
    }

    fn save(&self, context: &Context) -> Result<Context, AuthError> {
        let mut contexts = self.contexts.lock().expect("store lock poisoned");
        let current = contexts.get(&context.name).map_or(0, |c| c.revision);
        if contexts.contains_key(&context.name) && current != context.revision {
            return Err(AuthError::ContextConflict(context.name.clone()));
        }
        let mut stored = context.clone();
        stored.revision = context.revision + 1;
        contexts.insert(stored.name.clone(), stored.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<Context>, AuthError> {
        let mut contexts: Vec<_> = self
            .contexts
            .lock()
            .expect("store lock poisoned")
            .values()
            .cloned()
            .collect();
        contexts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contexts)
    }

    fn active(&self) -> Result<Option<String>, AuthError> {
        Ok(self.active.lock().expect("store lock poisoned").clone())
    }

    fn set_active(&self, name: &str) -> Result<(), AuthError> {
        if self.get(name).is_none() {
            return Err(AuthError::UnknownContext(name.to_string()));
        }
        *self.active.lock().expect("store lock poisoned") = Some(name.to_string());
        Ok(())
    }
}

/// Records every progress callback as a line of text.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("progress lock poisoned").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("progress lock poisoned").push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn device_code_issued(&self, session: &DeviceCodeSession) {
        self.push(format!("code {} at {}", session.user_code, session.display_url()));
    }

    fn time_remaining(&self, seconds: i64) {
        self.push(format!("remaining {seconds}"));
    }
}

pub fn test_settings() -> Settings {
    Settings::default().with_timeout(Duration::from_secs(5))
}

/// Discovery document pointing every endpoint at `server`.
pub fn discovery_document(server_uri: &str) -> String {
    format!(
        r#"version: 1
auth:
  default-provider-id: p1
  providers:
    p1:
      id: p1
      login-url: {server_uri}/authorize
      token-url: {server_uri}{TOKEN_PATH}
      code-url: {server_uri}{CODE_PATH}
      jwks-url: {server_uri}{JWKS_PATH}
      client-id: {CLIENT_ID}
"#
    )
}

pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1/authinfo.yaml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/yaml")
                .set_body_string(discovery_document(&server.uri())),
        )
        .mount(server)
        .await;
}

pub async fn mount_jwks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
        .mount(server)
        .await;
}

pub fn jwks() -> Value {
    json!({
        "keys": [{
            "kty": "oct",
            "kid": SIGNING_KEY_ID,
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(SIGNING_SECRET)
        }]
    })
}

pub fn identity_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": "https://login.example/",
        "sub": "user|42",
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 3600,
        "name": "Ada Lovelace",
        "nickname": "ada",
        "email": "ada@example.com",
        "email_verified": true,
        "ivcap/claims/account-id": "urn:account:42"
    })
}

pub fn id_token(claims: &Value) -> String {
    id_token_signed_with(claims, SIGNING_SECRET)
}

pub fn id_token_signed_with(claims: &Value, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(SIGNING_KEY_ID.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("encode id token")
}

pub fn token_success(access_token: &str, refresh_token: Option<&str>, id_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "scope": "openid profile email offline_access",
        "expires_in": 3600
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    if let Some(id) = id_token {
        body["id_token"] = json!(id);
    }
    body
}

pub fn token_error(code: &str) -> Value {
    json!({ "error": code, "error_description": format!("{code} from test server") })
}
