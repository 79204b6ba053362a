/// JWKS key retrieval and caching
///
/// Fetches the identity provider's signing keys from
/// `<issuer>/.well-known/jwks.json` and keeps them in memory by key id. A token
/// signed with a key we have not seen triggers a refetch, but never more often
/// than `min_refresh_interval` (12 seconds by default, i.e. at most five
/// fetches a minute) so forged key ids cannot hammer the provider.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::jwt::JwtError;

pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(12);

/// Connection timeout for the provider
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a whole key-set fetch
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    last_fetch: Option<Instant>,
}

/// Cached JWKS client
pub struct JwksClient {
    http: reqwest::Client,
    jwks_url: String,
    min_refresh_interval: Duration,
    request_timeout: Duration,
    cache: RwLock<KeyCache>,
}

/// Builds the JWKS location for an issuer URL, with or without trailing slash
pub fn jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}

fn http_client(request_timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            // Fetches are still bounded by `request_timeout` in `fetch`
            warn!(error = %e, "Falling back to a default HTTP client for key fetches");
            reqwest::Client::new()
        }
    }
}

impl JwksClient {
    pub fn new(issuer: &str) -> Self {
        Self::with_refresh_interval(issuer, DEFAULT_MIN_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(issuer: &str, min_refresh_interval: Duration) -> Self {
        Self {
            http: http_client(DEFAULT_REQUEST_TIMEOUT),
            jwks_url: jwks_url(issuer),
            min_refresh_interval,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache: RwLock::new(KeyCache::default()),
        }
    }

    /// Caps how long a single key-set fetch may take
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.http = http_client(request_timeout);
        self.request_timeout = request_timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.jwks_url
    }

    /// Returns the decoding key for `kid`, refetching the key set if needed
    ///
    /// The cache lock is never held across the network call, so lookups of
    /// cached keys proceed while a refetch is in flight.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, JwtError> {
        if let Some(key) = self.cache.read().await.keys.get(kid) {
            return Ok(key.clone());
        }

        {
            let mut cache = self.cache.write().await;

            // Another request may have refreshed while we waited for the lock
            if let Some(key) = cache.keys.get(kid) {
                return Ok(key.clone());
            }

            if let Some(last_fetch) = cache.last_fetch {
                if last_fetch.elapsed() < self.min_refresh_interval {
                    warn!(kid, "Unknown signing key; refresh rate-limited");
                    return Err(JwtError::UnknownKey(kid.to_string()));
                }
            }

            // Claimed before fetching so concurrent misses are rate-limited too
            cache.last_fetch = Some(Instant::now());
        }

        let set = self.fetch().await?;
        let keys = decode_keys(&set);
        let key = keys.get(kid).cloned();

        self.cache.write().await.keys = keys;

        key.ok_or_else(|| JwtError::UnknownKey(kid.to_string()))
    }

    /// Replaces the cached keys with `set` and returns how many were usable
    pub async fn load(&self, set: &JwkSet) -> usize {
        let mut cache = self.cache.write().await;
        cache.keys = decode_keys(set);
        cache.last_fetch = Some(Instant::now());
        cache.keys.len()
    }

    async fn fetch(&self) -> Result<JwkSet, JwtError> {
        debug!(url = %self.jwks_url, "Fetching signing keys");

        let request = async {
            self.http
                .get(&self.jwks_url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| JwtError::KeyFetch(e.to_string()))?
                .json::<JwkSet>()
                .await
                .map_err(|e| JwtError::KeyFetch(e.to_string()))
        };

        let set = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                JwtError::KeyFetch(format!(
                    "Timed out after {:?} fetching {}",
                    self.request_timeout, self.jwks_url
                ))
            })??;

        info!(keys = set.keys.len(), "Fetched signing keys");
        Ok(set)
    }
}

fn decode_keys(set: &JwkSet) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();

    for jwk in &set.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            debug!("Skipping signing key without a key id");
            continue;
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(e) => warn!(kid, error = %e, "Skipping unusable signing key"),
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // RSA public key from RFC 7517 appendix A.1
    fn key_set() -> JwkSet {
        serde_json::from_value(serde_json::json!({
            "keys": [
                {
                    "kty": "RSA",
                    "kid": "2011-04-29",
                    "alg": "RS256",
                    "use": "sig",
                    "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                    "e": "AQAB"
                },
                {
                    "kty": "RSA",
                    "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                    "e": "AQAB"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_jwks_url() {
        assert_eq!(
            jwks_url("https://tenant.auth0.com/"),
            "https://tenant.auth0.com/.well-known/jwks.json"
        );
        assert_eq!(
            jwks_url("https://tenant.auth0.com"),
            "https://tenant.auth0.com/.well-known/jwks.json"
        );
    }

    #[tokio::test]
    async fn test_loaded_keys_are_served_from_cache() {
        let client = JwksClient::new("http://127.0.0.1:9");

        assert_eq!(client.load(&key_set()).await, 1);
        assert!(client.key_for("2011-04-29").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kid_is_rate_limited() {
        let client = JwksClient::with_refresh_interval("http://127.0.0.1:9", Duration::from_secs(60));
        client.load(&key_set()).await;

        // Within the refresh interval no fetch is attempted
        assert!(matches!(
            client.key_for("rotated-key").await,
            Err(JwtError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let client = JwksClient::new("http://127.0.0.1:9");

        assert!(matches!(
            client.key_for("2011-04-29").await,
            Err(JwtError::KeyFetch(_))
        ));
        // The failed attempt still counts against the refresh interval
        assert!(matches!(
            client.key_for("2011-04-29").await,
            Err(JwtError::UnknownKey(_))
        ));
    }

    // Accepts connections and never answers
    async fn silent_provider() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_cached_key_served_while_refetch_hangs() {
        let (url, provider) = silent_provider().await;
        let client = Arc::new(JwksClient::with_refresh_interval(&url, Duration::ZERO));
        client.load(&key_set()).await;

        let refetch = {
            let client = client.clone();
            tokio::spawn(async move { client.key_for("rotated-key").await })
        };
        // Let the refetch reach the provider
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cached = tokio::time::timeout(Duration::from_secs(3), client.key_for("2011-04-29")).await;
        assert!(matches!(cached, Ok(Ok(_))));

        refetch.abort();
        provider.abort();
    }

    #[tokio::test]
    async fn test_hung_fetch_times_out() {
        let (url, provider) = silent_provider().await;
        let client = JwksClient::with_refresh_interval(&url, Duration::ZERO)
            .with_request_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(3), client.key_for("2011-04-29"))
            .await
            .expect("fetch should give up on its own");
        assert!(matches!(result, Err(JwtError::KeyFetch(_))));

        provider.abort();
    }
}
