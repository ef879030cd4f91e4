//! Breached-password lookup over the k-anonymity range protocol.
//!
//! Only the first 5 hex characters of the password's SHA-1 digest leave the
//! process. The service answers with every known `SUFFIX:COUNT` pair sharing
//! that prefix, and the match happens locally.

use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// Length of the digest prefix sent to the lookup service.
pub const PREFIX_LEN: usize = 5;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Breach lookup transport error: {0}")]
    Transport(String),
    #[error("Breach lookup returned HTTP {0}")]
    HttpStatus(u16),
    #[error("Invalid digest prefix: {0:?}")]
    InvalidPrefix(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        LookupError::Transport(e.to_string())
    }
}

/// Source of breach data for a digest prefix.
///
/// `lookup` receives a 5-character uppercase hex prefix and returns the raw
/// newline-delimited `SUFFIX:COUNT` body.
pub trait BreachLookup {
    fn lookup(&self, prefix: &str) -> impl Future<Output = Result<String, LookupError>> + Send;
}

/// Uppercase hex SHA-1 digest of `password`.
pub fn sha1_hex(password: &str) -> String {
    hex::encode_upper(Sha1::digest(password.as_bytes()))
}

/// Splits a digest into the prefix sent over the wire and the suffix kept local.
pub fn split_digest(digest: &str) -> (&str, &str) {
    digest.split_at(PREFIX_LEN.min(digest.len()))
}

/// Parses a range response into a map from full digest to breach count.
///
/// Accepts `\r\n`, `\n` and `\r` line endings. Blank or malformed lines are skipped.
pub fn parse_range_response(prefix: &str, body: &str) -> HashMap<String, u64> {
    body.split(['\r', '\n'])
        .filter_map(|line| {
            let (suffix, count) = line.trim().split_once(':')?;
            let count = count.trim().parse::<u64>().ok()?;
            Some((format!("{}{}", prefix, suffix.trim().to_uppercase()), count))
        })
        .collect()
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() == PREFIX_LEN && prefix.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(feature = "http")]
pub use self::http::PwnedPasswordsClient;

#[cfg(feature = "http")]
mod http {
    use super::{is_valid_prefix, BreachLookup, LookupError};
    use std::time::Duration;

    const DEFAULT_BASE_URL: &str = "https://api.pwnedpasswords.com";

    /// Request timeout for a single range query.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    const USER_AGENT: &str = concat!("pwd-policy/", env!("CARGO_PKG_VERSION"));

    /// [`BreachLookup`] backed by the Pwned Passwords range API.
    ///
    /// One attempt per lookup, no retries. Any network problem, timeout or
    /// non-2xx status is reported as a [`LookupError`].
    #[derive(Debug, Clone)]
    pub struct PwnedPasswordsClient {
        client: reqwest::Client,
        base_url: String,
    }

    impl PwnedPasswordsClient {
        pub fn new() -> Result<Self, LookupError> {
            Self::with_timeout(REQUEST_TIMEOUT)
        }

        pub fn with_timeout(timeout: Duration) -> Result<Self, LookupError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()?;
            Ok(Self {
                client,
                base_url: DEFAULT_BASE_URL.to_string(),
            })
        }

        /// Points the client at another range API endpoint (mirrors, test servers).
        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
            self
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        fn range_url(&self, prefix: &str) -> String {
            format!("{}/range/{}", self.base_url, prefix)
        }
    }

    impl BreachLookup for PwnedPasswordsClient {
        async fn lookup(&self, prefix: &str) -> Result<String, LookupError> {
            if !is_valid_prefix(prefix) {
                return Err(LookupError::InvalidPrefix(prefix.to_string()));
            }

            let response = self
                .client
                .get(self.range_url(prefix))
                .header("Add-Padding", "true")
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(LookupError::HttpStatus(response.status().as_u16()));
            }

            Ok(response.text().await?)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        /// Serves `response` to a single connection and returns the raw request head.
        async fn serve_once(response: String) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
                String::from_utf8_lossy(&request).into_owned()
            });

            (base_url, handle)
        }

        fn http_response(status: &str, body: &str) -> String {
            format!(
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
        }

        #[tokio::test]
        async fn test_lookup_returns_body_and_sends_padding_header() {
            let body = "1E4C9B93F3F0682250B6CF8331B7EE68FD8:150\r\n0018A45C4D1DEF81644B54AB7F969B88D65:0";
            let (base_url, server) = serve_once(http_response("200 OK", body)).await;

            let client = PwnedPasswordsClient::new().unwrap().with_base_url(base_url);
            let result = client.lookup("5BAA6").await.unwrap();
            assert_eq!(result, body);

            let request = server.await.unwrap().to_lowercase();
            assert!(request.starts_with("get /range/5baa6 http/1.1"), "request: {}", request);
            assert!(request.contains("add-padding: true"), "request: {}", request);
            assert!(request.contains("user-agent: pwd-policy/"), "request: {}", request);
        }

        #[tokio::test]
        async fn test_lookup_non_success_status() {
            let (base_url, server) =
                serve_once(http_response("503 Service Unavailable", "")).await;

            let client = PwnedPasswordsClient::new().unwrap().with_base_url(base_url);
            let result = client.lookup("5BAA6").await;
            assert!(matches!(result, Err(LookupError::HttpStatus(503))), "got {:?}", result);

            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_evaluator_fails_open_on_http_error() {
            use crate::{PolicyEvaluator, PolicyStore};
            use secrecy::SecretString;
            use std::sync::Arc;

            let (base_url, server) = serve_once(http_response("429 Too Many Requests", "")).await;
            let store = PolicyStore::from_json_str(r#"{"member": {"breach_threshold": 1}}"#).unwrap();
            let evaluator = PolicyEvaluator::new(
                Arc::new(store),
                PwnedPasswordsClient::new().unwrap().with_base_url(base_url),
            );

            let password = SecretString::new("password".to_string().into());
            assert!(evaluator.validate("member", password).await.is_accepted());

            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_evaluator_rejects_breached_password_over_http() {
            use crate::{PolicyEvaluator, PolicyStore, ValidationFailure, ValidationResult};
            use secrecy::SecretString;
            use std::sync::Arc;

            let body = "1E4C9B93F3F0682250B6CF8331B7EE68FD8:150";
            let (base_url, server) = serve_once(http_response("200 OK", body)).await;
            let store = PolicyStore::from_json_str(r#"{"member": {"breach_threshold": 100}}"#).unwrap();
            let evaluator = PolicyEvaluator::new(
                Arc::new(store),
                PwnedPasswordsClient::new().unwrap().with_base_url(base_url),
            );

            let password = SecretString::new("password".to_string().into());
            assert_eq!(
                evaluator.validate("member", password).await,
                ValidationResult::Rejected(vec![ValidationFailure::BreachCountExceeded { count: 150 }])
            );

            server.await.unwrap();
        }

        #[test]
        fn test_new_does_not_fail() {
            let client = PwnedPasswordsClient::new().unwrap();
            assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        }

        #[test]
        fn test_range_url() {
            let client = PwnedPasswordsClient::new()
                .unwrap()
                .with_base_url("http://localhost:8080/");
            assert_eq!(client.range_url("5BAA6"), "http://localhost:8080/range/5BAA6");
        }

        #[tokio::test]
        async fn test_lookup_rejects_invalid_prefix() {
            let client = PwnedPasswordsClient::new().unwrap();
            let result = client.lookup("password").await;
            assert!(matches!(result, Err(LookupError::InvalidPrefix(_))));
        }

        #[tokio::test]
        async fn test_lookup_unreachable_host_is_transport_error() {
            let client = PwnedPasswordsClient::with_timeout(Duration::from_millis(500))
                .unwrap()
                .with_base_url("http://127.0.0.1:9");
            let result = client.lookup("5BAA6").await;
            assert!(matches!(result, Err(LookupError::Transport(_))));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // SHA-1("password") = 5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8
    const PASSWORD_DIGEST: &str = "5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8";

    #[test]
    fn test_sha1_hex_uppercase() {
        assert_eq!(sha1_hex("password"), PASSWORD_DIGEST);
    }

    #[test]
    fn test_split_digest() {
        let (prefix, suffix) = split_digest(PASSWORD_DIGEST);
        assert_eq!(prefix, "5BAA6");
        assert_eq!(suffix, "1E4C9B93F3F0682250B6CF8331B7EE68FD8");
        assert_eq!(suffix.len(), 35);
    }

    #[test]
    fn test_parse_range_response_mixed_line_endings() {
        let body = "1E4C9B93F3F0682250B6CF8331B7EE68FD8:150\r\n\
                    0018A45C4D1DEF81644B54AB7F969B88D65:3\n\
                    00D4F6E8FA6EECAD2A3AA415EEC418D38EC:0\r";
        let breaches = parse_range_response("5BAA6", body);
        assert_eq!(breaches.len(), 3);
        assert_eq!(breaches.get(PASSWORD_DIGEST), Some(&150));
        assert_eq!(breaches.get("5BAA600D4F6E8FA6EECAD2A3AA415EEC418D38EC"), Some(&0));
    }

    #[test]
    fn test_parse_range_response_skips_malformed_lines() {
        let body = "\nnot a pair\n1E4C9B93F3F0682250B6CF8331B7EE68FD8:abc\nABCDEF:7\n";
        let breaches = parse_range_response("5BAA6", body);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches.get("5BAA6ABCDEF"), Some(&7));
    }

    #[test]
    fn test_parse_range_response_lowercase_suffix() {
        let breaches = parse_range_response("5BAA6", "1e4c9b93f3f0682250b6cf8331b7ee68fd8:9");
        assert_eq!(breaches.get(PASSWORD_DIGEST), Some(&9));
    }

    #[test]
    fn test_is_valid_prefix() {
        assert!(is_valid_prefix("5BAA6"));
        assert!(!is_valid_prefix("5BAA"));
        assert!(!is_valid_prefix("5BAAG"));
    }
}
