/// JWT validation for identity-provider tokens
///
/// Tokens are issued by an external identity provider. Orgdesk only checks
/// them: signature, expiry, issuer and audience, then reads the user's email
/// from a namespaced custom claim (e.g. `https://orgdesk.dev/email`).
///
/// # Algorithms
///
/// - **RS256**: production, keys fetched from the provider's JWKS (see [`super::jwks`])
/// - **HS256**: local development and tests, shared secret
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use jsonwebtoken::{Algorithm, DecodingKey};
/// use orgdesk_shared::auth::jwt::{create_hs256_token, validate_token, Claims, TokenSettings};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = TokenSettings {
///     issuer: "https://auth.example.com/".to_string(),
///     audience: "https://api.example.com".to_string(),
///     email_claim: "https://orgdesk.dev/email".to_string(),
/// };
///
/// let claims = Claims::new("auth0|123", "jane@example.com", &settings, Duration::hours(1));
/// let token = create_hs256_token(&claims, "dev-secret")?;
///
/// let key = DecodingKey::from_secret(b"dev-secret");
/// let identity = validate_token(&token, &key, Algorithm::HS256, &settings)?;
/// assert_eq!(identity.email, "jane@example.com");
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Invalid audience")]
    InvalidAudience,

    /// The namespaced email claim is absent or not a string
    #[error("Token is missing the {0} claim")]
    MissingEmailClaim(String),

    /// No signing key with this id is known
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    /// The key set could not be retrieved or parsed
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

/// What a token must carry to be accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    /// Expected `iss`, e.g. `https://tenant.auth0.com/`
    pub issuer: String,

    /// Expected `aud`
    pub audience: String,

    /// Name of the custom claim holding the user's email
    pub email_claim: String,
}

/// Token payload
///
/// Provider-specific claims (including the email claim) land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,

    pub iss: String,

    /// A single audience or a list
    pub aud: Value,

    pub exp: i64,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Claims {
    /// Claims that pass validation against `settings` until `expires_in` from now
    pub fn new(
        subject: impl Into<String>,
        email: &str,
        settings: &TokenSettings,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let mut extra = HashMap::new();
        extra.insert(settings.email_claim.clone(), Value::String(email.to_string()));

        Self {
            sub: subject.into(),
            iss: settings.issuer.clone(),
            aud: Value::String(settings.audience.clone()),
            exp: (now + expires_in).timestamp(),
            iat: Some(now.timestamp()),
            extra,
        }
    }
}

/// The identity a valid token asserts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: String,
}

/// Signs claims with HS256
///
/// Orgdesk never issues tokens in production; this is for local development
/// against a shared secret and for tests.
pub fn create_hs256_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Reads the key id from a token header without verifying anything
pub fn token_key_id(token: &str) -> Result<Option<String>, JwtError> {
    jsonwebtoken::decode_header(token)
        .map(|header| header.kid)
        .map_err(|e| JwtError::InvalidFormat(e.to_string()))
}

/// Validates a token and extracts the asserted identity
///
/// Verifies:
/// - Signature with `key` and `algorithm`
/// - `exp` has not passed
/// - `iss` and `aud` match `settings`
/// - the email claim named by `settings.email_claim` is a string
pub fn validate_token(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    settings: &TokenSettings,
) -> Result<IdentityClaims, JwtError> {
    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[settings.issuer.as_str()]);
    validation.set_audience(&[settings.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        ErrorKind::InvalidAudience => JwtError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            JwtError::InvalidFormat(e.to_string())
        }
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    let claims = token_data.claims;
    let email = claims
        .extra
        .get(&settings.email_claim)
        .and_then(Value::as_str)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| JwtError::MissingEmailClaim(settings.email_claim.clone()))?;

    Ok(IdentityClaims {
        subject: claims.sub,
        email: email.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn settings() -> TokenSettings {
        TokenSettings {
            issuer: "https://auth.example.com/".to_string(),
            audience: "https://api.orgdesk.dev".to_string(),
            email_claim: "https://orgdesk.dev/email".to_string(),
        }
    }

    fn validate(token: &str) -> Result<IdentityClaims, JwtError> {
        validate_token(
            token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            Algorithm::HS256,
            &settings(),
        )
    }

    #[test]
    fn test_valid_token() {
        let claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        let token = create_hs256_token(&claims, SECRET).unwrap();

        let identity = validate(&token).unwrap();
        assert_eq!(identity.subject, "auth0|1");
        assert_eq!(identity.email, "jane@example.com");
    }

    #[test]
    fn test_missing_email_claim() {
        let mut claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        claims.extra.clear();
        claims.extra.insert("email".to_string(), Value::String("jane@example.com".to_string()));
        let token = create_hs256_token(&claims, SECRET).unwrap();

        assert!(matches!(validate(&token), Err(JwtError::MissingEmailClaim(_))));
    }

    #[test]
    fn test_wrong_audience() {
        let mut claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        claims.aud = Value::String("https://someone-else".to_string());
        let token = create_hs256_token(&claims, SECRET).unwrap();

        assert!(matches!(validate(&token), Err(JwtError::InvalidAudience)));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        claims.iss = "https://evil.example.com/".to_string();
        let token = create_hs256_token(&claims, SECRET).unwrap();

        assert!(matches!(validate(&token), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(-2));
        let token = create_hs256_token(&claims, SECRET).unwrap();

        assert!(matches!(validate(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_secret() {
        let claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        let token = create_hs256_token(&claims, "another-secret-entirely-0123456789").unwrap();

        assert!(validate(&token).is_err());
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(validate("not.a.jwt"), Err(JwtError::InvalidFormat(_))));
        assert!(token_key_id("garbage").is_err());
    }

    #[test]
    fn test_audience_list_is_accepted() {
        let mut claims = Claims::new("auth0|1", "jane@example.com", &settings(), Duration::hours(1));
        claims.aud = serde_json::json!(["https://api.orgdesk.dev", "https://auth.example.com/userinfo"]);
        let token = create_hs256_token(&claims, SECRET).unwrap();

        assert!(validate(&token).is_ok());
    }
}
