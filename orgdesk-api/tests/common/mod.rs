/// Common test utilities for API tests
///
/// Builds the full router on top of the in-memory executor and event sink,
/// with HS256 bearer tokens signed by a shared test secret.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use orgdesk_api::app::{build_router, AppState};
use orgdesk_api::config::{ApiConfig, AuthConfig, Config, DatabaseConfig, DEFAULT_EMAIL_CLAIM};
use orgdesk_shared::auth::jwt::{create_hs256_token, Claims, TokenSettings};
use orgdesk_shared::auth::middleware::TokenVerifier;
use orgdesk_shared::testing::{MockExecutor, RecordingEventSink};
use serde_json::{json, Value};
use tower::Service as _;

pub const SECRET: &str = "orgdesk-test-secret-with-32-plus-bytes";

/// Test context containing the router and its doubles
pub struct TestContext {
    pub db: Arc<MockExecutor>,
    pub events: Arc<RecordingEventSink>,
    pub app: Router,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/orgdesk_test".to_string(),
                max_connections: 1,
            },
            auth: AuthConfig {
                issuer_url: "https://orgdesk.test/".to_string(),
                audience: "https://api.orgdesk.test".to_string(),
                email_claim: DEFAULT_EMAIL_CLAIM.to_string(),
                shared_secret: Some(SECRET.to_string()),
            },
        };

        let db = MockExecutor::new();
        let events = RecordingEventSink::new();
        let verifier = TokenVerifier::shared_secret(config.token_settings(), SECRET);
        let state = AppState::new(db.clone(), events.clone(), verifier, config.clone());

        Self {
            db,
            events,
            app: build_router(state),
            config,
        }
    }

    pub fn settings(&self) -> TokenSettings {
        self.config.token_settings()
    }

    /// Signs a token for `email`
    pub fn token_for(&self, email: &str) -> String {
        let claims = Claims::new("auth0|test", email, &self.settings(), chrono::Duration::hours(1));
        create_hs256_token(&claims, SECRET).unwrap()
    }

    /// Makes `user_id` the authenticated caller and returns its bearer header
    pub fn sign_in(&self, user_id: i64, email: &str) -> String {
        self.db.respond_always("find-user-by-email", vec![user_row(user_id, email)]);
        format!("Bearer {}", self.token_for(email))
    }

    /// Sends a request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, body)
    }
}

pub fn user_row(user_id: i64, email: &str) -> Value {
    json!({
        "user_id": user_id,
        "username": null,
        "first_name": null,
        "last_name": null,
        "email": email,
        "is_verified": false
    })
}

pub fn membership_row(org_id: i64, user_id: i64, is_admin: bool, is_active: bool) -> Value {
    json!({
        "org_user_id": org_id * 100 + user_id,
        "org_id": org_id,
        "user_id": user_id,
        "is_admin": is_admin,
        "is_active": is_active
    })
}

pub fn organization_row(org_id: i64, name: &str) -> Value {
    json!({ "org_id": org_id, "name": name, "description": null })
}
