//! HTTP plumbing shared by the chat backends.

use crate::error::ReasoningError;
use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 300;

/// Build an HTTP client with the configured request timeout.
pub fn http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .context("Failed to create HTTP client")
}

/// Classify a transport-level failure.
pub fn map_send_error(err: reqwest::Error, base_url: &str) -> ReasoningError {
    if err.is_timeout() {
        ReasoningError::Timeout
    } else if err.is_connect() {
        ReasoningError::Unavailable(format!("cannot connect to {}", base_url))
    } else if err.is_decode() {
        ReasoningError::InvalidResponse(format!("undecodable response body: {}", err))
    } else {
        ReasoningError::Unavailable(format!("request failed: {}", err))
    }
}

/// Classify a non-success HTTP status.
pub fn map_status(status: StatusCode, body: &str) -> ReasoningError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ReasoningError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ReasoningError::Timeout,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReasoningError::Unavailable(format!("authentication rejected ({})", status))
        }
        _ => {
            let mut body = body.trim().to_string();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
                body.push_str("...");
            }
            ReasoningError::Unavailable(format!("API error {}: {}", status, body))
        }
    }
}

/// Pass successful responses through; convert the rest into errors.
pub async fn ensure_success(response: Response) -> Result<Response, ReasoningError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, &body))
}

/// Read a successful response body and decode it as JSON.
///
/// Failures while reading the body (timeouts included) are classified like
/// send errors. Only a body that arrived but does not decode is
/// `InvalidResponse`.
pub async fn read_json<T: DeserializeOwned>(
    response: Response,
    base_url: &str,
) -> Result<T, ReasoningError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| map_send_error(e, base_url))?;

    serde_json::from_slice(&body)
        .map_err(|e| ReasoningError::InvalidResponse(format!("malformed reply body: {}", e)))
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, answer with `reply`, then hold the socket open
    /// for `hold` without sending anything else.
    pub async fn serve_once(reply: String, hold: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.flush().await;
            tokio::time::sleep(hold).await;
        });

        addr
    }

    /// HTTP/1.1 200 header block announcing `content_length` JSON bytes.
    pub fn ok_headers(content_length: usize) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            content_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::{ok_headers, serve_once};
    use super::*;

    #[test]
    fn test_rate_limit_and_timeouts_are_transient() {
        assert_eq!(map_status(StatusCode::TOO_MANY_REQUESTS, ""), ReasoningError::RateLimited);
        assert_eq!(map_status(StatusCode::GATEWAY_TIMEOUT, ""), ReasoningError::Timeout);
        assert!(map_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
    }

    #[test]
    fn test_auth_and_server_errors_are_unavailable() {
        let auth = map_status(StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(auth.kind(), "Unavailable");
        assert!(!auth.is_retryable());

        let server = map_status(StatusCode::INTERNAL_SERVER_ERROR, "model not loaded");
        assert!(server.to_string().contains("model not loaded"));
    }

    #[test]
    fn test_long_error_bodies_are_truncated() {
        let body = "é".repeat(400);
        let err = map_status(StatusCode::BAD_GATEWAY, &body);
        assert!(err.to_string().ends_with("..."));
        assert!(err.to_string().len() < 400);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Reply {
        ok: bool,
    }

    async fn fetch(reply: String, hold: Duration) -> Result<Reply, ReasoningError> {
        let addr = serve_once(reply, hold).await;
        let base_url = format!("http://{}", addr);
        let response = http_client(1)
            .unwrap()
            .get(&base_url)
            .send()
            .await
            .map_err(|e| map_send_error(e, &base_url))?;
        read_json(ensure_success(response).await?, &base_url).await
    }

    #[tokio::test]
    async fn test_read_json_decodes_complete_body() {
        let body = r#"{"ok": true}"#;
        let reply = fetch(format!("{}{}", ok_headers(body.len()), body), Duration::ZERO)
            .await
            .unwrap();
        assert!(reply.ok);
    }

    #[tokio::test]
    async fn test_stalled_body_is_a_timeout() {
        let partial = r#"{"ok":"#;
        let err = fetch(format!("{}{}", ok_headers(200), partial), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err, ReasoningError::Timeout);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_garbled_body_is_invalid_response() {
        let body = "not json at all";
        let err = fetch(format!("{}{}", ok_headers(body.len()), body), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidResponse");
    }
}
