/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `AUTH_ISSUER_URL`: Identity provider issuer (required)
/// - `AUTH_AUDIENCE`: Expected token audience (required)
/// - `AUTH_EMAIL_CLAIM`: Claim carrying the caller's email
///   (default: https://orgdesk.dev/email)
/// - `AUTH_SHARED_SECRET`: Verify HS256 tokens with this secret instead of
///   fetching the provider's keys (local development only)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use orgdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use orgdesk_shared::auth::jwt::TokenSettings;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_EMAIL_CLAIM: &str = "https://orgdesk.dev/email";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Identity provider configuration
    pub auth: AuthConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Issuer URL; signing keys are fetched from `<issuer>/.well-known/jwks.json`
    pub issuer_url: String,

    pub audience: String,

    /// Namespaced claim holding the caller's email
    pub email_claim: String,

    /// HS256 secret that replaces JWKS verification when set
    #[serde(skip_serializing)]
    pub shared_secret: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;
        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let issuer_url = env::var("AUTH_ISSUER_URL")
            .map_err(|_| anyhow::anyhow!("AUTH_ISSUER_URL environment variable is required"))?;

        let audience = env::var("AUTH_AUDIENCE")
            .map_err(|_| anyhow::anyhow!("AUTH_AUDIENCE environment variable is required"))?;

        let email_claim =
            env::var("AUTH_EMAIL_CLAIM").unwrap_or_else(|_| DEFAULT_EMAIL_CLAIM.to_string());

        let shared_secret = env::var("AUTH_SHARED_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty());

        if let Some(secret) = &shared_secret {
            if secret.len() < 32 {
                anyhow::bail!("AUTH_SHARED_SECRET must be at least 32 characters long");
            }
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig {
                issuer_url,
                audience,
                email_claim,
                shared_secret,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Issuer, audience and email claim expected on bearer tokens
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            issuer: self.auth.issuer_url.clone(),
            audience: self.auth.audience.clone(),
            email_claim: self.auth.email_claim.clone(),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                issuer_url: "https://orgdesk.auth0.com/".to_string(),
                audience: "https://api.orgdesk.dev".to_string(),
                email_claim: DEFAULT_EMAIL_CLAIM.to_string(),
                shared_secret: None,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_token_settings() {
        let settings = config().token_settings();
        assert_eq!(settings.issuer, "https://orgdesk.auth0.com/");
        assert_eq!(settings.audience, "https://api.orgdesk.dev");
        assert_eq!(settings.email_claim, "https://orgdesk.dev/email");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://app.orgdesk.dev, http://localhost:3000,"),
            vec!["https://app.orgdesk.dev", "http://localhost:3000"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);

        let mut config = config();
        assert!(config.allows_any_origin());
        config.api.cors_origins = parse_origins("https://app.orgdesk.dev");
        assert!(!config.allows_any_origin());
    }
}
