//! Static-credential authentication for the HTTP façade.
//!
//! Two recognized forms: a pre-shared API key (via `X-API-Key` or
//! `Authorization: Bearer <key>`) or HTTP Basic credentials checked against
//! the configured username / password-hash table. Credentials are supplied
//! entirely through configuration — see [`crate::config::AuthConfig`].

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

/// How a request authenticated, mostly useful for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    BasicAuth,
}

/// Hex SHA-256 of a password, the format stored in `auth.users`.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate_api_key(auth: &AuthConfig, key: &str) -> bool {
    !key.is_empty() && auth.api_keys.iter().any(|k| k == key)
}

fn validate_basic(auth: &AuthConfig, encoded: &str) -> bool {
    let Ok(bytes) = BASE64.decode(encoded) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(bytes) else {
        return false;
    };
    let Some((username, password)) = credentials.split_once(':') else {
        return false;
    };
    if username.is_empty() || password.is_empty() {
        return false;
    }
    let hashed = hash_password(password);
    auth.users
        .iter()
        .any(|u| u.username == username && u.password_sha256.eq_ignore_ascii_case(&hashed))
}

/// Check a request's headers against the configured credentials. `None`
/// means no accepted form matched.
pub fn authenticate(auth: &AuthConfig, headers: &HeaderMap) -> Option<AuthMethod> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if validate_api_key(auth, key) {
            return Some(AuthMethod::ApiKey);
        }
    }

    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(key) = value.strip_prefix("Bearer ") {
            if validate_api_key(auth, key) {
                return Some(AuthMethod::ApiKey);
            }
        }
        if let Some(encoded) = value.strip_prefix("Basic ") {
            if validate_basic(auth, encoded) {
                return Some(AuthMethod::BasicAuth);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserCredential;
    use axum::http::{HeaderName, HeaderValue};

    fn test_auth() -> AuthConfig {
        AuthConfig {
            api_keys: vec!["tk-test-key".to_string()],
            users: vec![UserCredential {
                username: "dana".to_string(),
                password_sha256: hash_password("hunter2"),
            }],
        }
    }

    fn headers(name: &str, value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        h
    }

    #[test]
    fn api_key_header_accepted() {
        let auth = test_auth();
        assert_eq!(
            authenticate(&auth, &headers("x-api-key", "tk-test-key")),
            Some(AuthMethod::ApiKey)
        );
        assert_eq!(authenticate(&auth, &headers("x-api-key", "wrong")), None);
    }

    #[test]
    fn bearer_token_accepted() {
        let auth = test_auth();
        assert_eq!(
            authenticate(&auth, &headers("authorization", "Bearer tk-test-key")),
            Some(AuthMethod::ApiKey)
        );
        assert_eq!(
            authenticate(&auth, &headers("authorization", "Bearer nope")),
            None
        );
    }

    #[test]
    fn basic_credentials_accepted() {
        let auth = test_auth();
        let good = BASE64.encode("dana:hunter2");
        assert_eq!(
            authenticate(&auth, &headers("authorization", &format!("Basic {}", good))),
            Some(AuthMethod::BasicAuth)
        );

        let bad_password = BASE64.encode("dana:wrong");
        assert_eq!(
            authenticate(
                &auth,
                &headers("authorization", &format!("Basic {}", bad_password))
            ),
            None
        );

        let unknown_user = BASE64.encode("mallory:hunter2");
        assert_eq!(
            authenticate(
                &auth,
                &headers("authorization", &format!("Basic {}", unknown_user))
            ),
            None
        );

        assert_eq!(
            authenticate(&auth, &headers("authorization", "Basic not-base64!!!")),
            None
        );
    }

    #[test]
    fn missing_headers_rejected() {
        let auth = test_auth();
        assert_eq!(authenticate(&auth, &HeaderMap::new()), None);
    }

    #[test]
    fn empty_config_rejects_everything() {
        let auth = AuthConfig::default();
        assert_eq!(authenticate(&auth, &headers("x-api-key", "")), None);
        assert_eq!(authenticate(&auth, &headers("x-api-key", "anything")), None);
    }
}
