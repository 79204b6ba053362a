/// Authentication middleware for Axum
///
/// Validates the bearer token on each request, resolves the token's email to
/// an Orgdesk user id and adds [`AuthUser`] to the request extensions.
///
/// # Authentication Flow
///
/// 1. Read `Authorization: Bearer <token>`
/// 2. Verify the token ([`TokenVerifier`]: JWKS/RS256 or shared-secret/HS256)
/// 3. Look up the user by the email claim
/// 4. Insert [`AuthUser`] into request extensions
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use orgdesk_shared::auth::jwt::TokenSettings;
/// use orgdesk_shared::auth::middleware::{create_auth_middleware, AuthUser, TokenVerifier};
/// use orgdesk_shared::models::user::UserRepository;
///
/// async fn whoami(Extension(user): Extension<AuthUser>) -> String {
///     format!("user {}", user.user_id)
/// }
///
/// # fn example(users: UserRepository, settings: TokenSettings) {
/// let verifier = TokenVerifier::shared_secret(settings, "dev-secret");
///
/// let app: Router = Router::new()
///     .route("/me", get(whoami))
///     .layer(middleware::from_fn(create_auth_middleware(verifier, users)));
/// # }
/// ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::jwks::JwksClient;
use super::jwt::{token_key_id, validate_token, IdentityClaims, JwtError, TokenSettings};
use crate::models::user::UserRepository;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// Where signature keys come from
#[derive(Clone)]
pub enum KeySource {
    /// RS256 keys from the identity provider
    Jwks(Arc<JwksClient>),

    /// HS256 with a locally configured secret
    SharedSecret(DecodingKey),
}

/// Verifies bearer tokens against the configured issuer and audience
#[derive(Clone)]
pub struct TokenVerifier {
    settings: TokenSettings,
    keys: KeySource,
}

impl TokenVerifier {
    pub fn new(settings: TokenSettings, keys: KeySource) -> Self {
        Self { settings, keys }
    }

    /// RS256 verification with keys from `<issuer>/.well-known/jwks.json`
    pub fn jwks(settings: TokenSettings) -> Self {
        let client = JwksClient::new(&settings.issuer);
        Self::new(settings, KeySource::Jwks(Arc::new(client)))
    }

    pub fn shared_secret(settings: TokenSettings, secret: &str) -> Self {
        Self::new(
            settings,
            KeySource::SharedSecret(DecodingKey::from_secret(secret.as_bytes())),
        )
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, JwtError> {
        match &self.keys {
            KeySource::SharedSecret(key) => {
                validate_token(token, key, Algorithm::HS256, &self.settings)
            }
            KeySource::Jwks(client) => {
                let kid = token_key_id(token)?.ok_or_else(|| {
                    JwtError::InvalidFormat("Token header has no key id".to_string())
                })?;
                let key = client.key_for(&kid).await?;
                validate_token(token, &key, Algorithm::RS256, &self.settings)
            }
        }
    }
}

/// Authentication error type
#[derive(Debug)]
pub enum AuthError {
    /// No Authorization header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token failed verification
    InvalidToken(String),

    /// Token is valid but no user has its email
    UnknownUser,

    /// Lookup failed
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "No account is registered for this identity".to_string(),
            ),
            AuthError::Internal(msg) => {
                error!(error = %msg, "Authentication lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Authorization header is not valid text".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    Ok(token)
}

/// Bearer authentication middleware
///
/// Responds 401 for missing, malformed or invalid tokens and for tokens whose
/// email has no account.
pub async fn auth_middleware(
    verifier: TokenVerifier,
    users: UserRepository,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;

    let identity = verifier.verify(token).await.map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        match e {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
            JwtError::InvalidAudience => AuthError::InvalidToken("Invalid audience".to_string()),
            JwtError::KeyFetch(msg) => AuthError::Internal(msg),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    })?;

    let user_id = users
        .find_id_by_email(&identity.email)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    req.extensions_mut().insert(AuthUser {
        user_id,
        email: identity.email,
    });

    Ok(next.run(req).await)
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Wraps [`auth_middleware`] for `axum::middleware::from_fn`
pub fn create_auth_middleware(
    verifier: TokenVerifier,
    users: UserRepository,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    move |req, next| {
        let verifier = verifier.clone();
        let users = users.clone();
        Box::pin(auth_middleware(verifier, users, req, next))
    }
}
