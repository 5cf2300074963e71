//! Shared HTTP client, SSE parsing, and auth headers.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::ShimError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No client-level timeout: request and fragment deadlines are enforced by
/// the agent so that long streams are not cut off mid-reply.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// How the API key is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` (OpenAI).
    Bearer,
    /// `api-key: <key>` (Azure OpenAI).
    ApiKeyHeader,
}

/// Build JSON request headers carrying `api_key` in the given style.
pub fn auth_headers(api_key: &str, style: AuthStyle) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    match style {
        AuthStyle::Bearer => {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        AuthStyle::ApiKeyHeader => {
            if let Ok(val) = HeaderValue::from_str(api_key) {
                headers.insert("api-key", val);
            }
        }
    }
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Take the next complete line out of a raw SSE byte buffer.
///
/// Bytes after the last newline stay buffered, so a multi-byte character
/// split across network chunks is decoded only once it is whole.
pub fn take_line(buffer: &mut Vec<u8>) -> Option<Result<String, ShimError>> {
    let line_end = buffer.iter().position(|b| *b == b'\n')?;
    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
    Some(
        String::from_utf8(raw)
            .map(|line| line.trim().to_string())
            .map_err(|e| ShimError::MalformedResponse(format!("stream line is not UTF-8: {e}"))),
    )
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> ShimError {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => ShimError::Authentication(message),
        429 => ShimError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ShimError::api(status, message),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_character_survives_chunking() {
        let line = "data: {\"content\":\"20°C\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC2).unwrap() + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&line[..split]);
        assert!(take_line(&mut buffer).is_none());

        buffer.extend_from_slice(&line[split..]);
        let decoded = take_line(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded, "data: {\"content\":\"20°C\"}");
        assert!(buffer.is_empty());
    }

    #[test]
    fn invalid_utf8_line_is_malformed() {
        let mut buffer = vec![b'd', 0xFF, b'\n', b'x'];
        let err = take_line(&mut buffer).unwrap().unwrap_err();
        assert!(matches!(err, ShimError::MalformedResponse(_)));
        assert_eq!(buffer, b"x");
    }

    #[test]
    fn sse_data_lines() {
        assert_eq!(parse_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data("event: ping"), None);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_to_error(401, r#"{"error":{"message":"bad key"}}"#),
            ShimError::Authentication(ref m) if m == "bad key"
        ));
        assert!(matches!(
            status_to_error(429, r#"{"error":{"retry_after":1.5}}"#),
            ShimError::RateLimited { retry_after_ms: Some(1500) }
        ));
        assert!(matches!(
            status_to_error(503, "upstream down"),
            ShimError::Api { status: 503, ref message } if message == "upstream down"
        ));
    }

    #[test]
    fn api_key_header_style() {
        let headers = auth_headers("secret", AuthStyle::ApiKeyHeader);
        assert_eq!(headers.get("api-key").unwrap(), "secret");
        assert!(headers.get(AUTHORIZATION).is_none());

        let headers = auth_headers("secret", AuthStyle::Bearer);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }
}
