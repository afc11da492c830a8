//! web_request tool implementation.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::error::{Result, WorkspaceError};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Upper bound on response bytes read, whatever the preview limit.
const MAX_BODY_BYTES: usize = 10 * 1_024 * 1_024;

/// Longest UTF-8 encoding of a single character.
const MAX_CHAR_BYTES: usize = 4;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum HttpMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

/// Input for web_request tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebRequestInput {
    /// URL to request (http or https).
    pub url: String,

    /// HTTP method: GET (default) or POST.
    #[serde(default)]
    pub method: HttpMethod,

    /// Extra request headers.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// JSON body for POST. Defaults to an empty object.
    #[serde(default)]
    pub data: Option<Value>,
}

/// Output for web_request tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebRequestOutput {
    /// HTTP status code.
    pub status: u16,

    /// The final URL after redirects.
    pub final_url: String,

    /// Response MIME type without parameters (e.g., "application/json").
    pub content_type: String,

    /// Beginning of the response body.
    pub body: String,

    /// Whether `body` was cut at the preview limit.
    pub truncated: bool,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Handle the web_request tool call.
pub async fn handle_web_request(
    config: &Config,
    client: &reqwest::Client,
    params: Parameters<WebRequestInput>,
) -> std::result::Result<Json<WebRequestOutput>, McpError> {
    let input = params.0;
    let url = input.url.clone();

    run(config, client, input).await.map(Json).map_err(|e| {
        tracing::debug!(url = %url, error = %e, "web request failed");
        e.to_mcp_error()
    })
}

async fn run(
    config: &Config,
    client: &reqwest::Client,
    input: WebRequestInput,
) -> Result<WebRequestOutput> {
    let url = validate_url(&input.url)?;
    let headers = build_headers(input.headers.as_ref())?;
    let timeout_ms = config.request_timeout_ms;

    let request = match input.method {
        HttpMethod::Get => client.get(url),
        HttpMethod::Post => {
            let body = input.data.unwrap_or_else(|| Value::Object(Default::default()));
            client.post(url).json(&body)
        }
    };

    let response = request
        .headers(headers)
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                WorkspaceError::RequestTimeout(timeout_ms)
            } else {
                WorkspaceError::RequestFailed(e.to_string())
            }
        })?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "text/plain".to_string());

    let cap = body_cap(config.preview_limit);
    let (bytes, capped) = read_capped(response, cap, timeout_ms).await?;
    let text = decode_prefix(&bytes, capped);
    let (body, cut) = preview(&text, config.preview_limit);
    let truncated = capped || cut;

    tracing::info!("{:?} {} -> {}", input.method, final_url, status);

    Ok(WebRequestOutput {
        status,
        final_url,
        content_type,
        body,
        truncated,
    })
}

/// Bytes needed to fill a preview of `limit` characters.
fn body_cap(limit: usize) -> usize {
    limit.saturating_mul(MAX_CHAR_BYTES).min(MAX_BODY_BYTES)
}

/// Read the body chunk by chunk, stopping once more than `cap` bytes arrived.
/// Returns the bytes kept and whether the rest of the body was left unread.
async fn read_capped(
    mut response: reqwest::Response,
    cap: usize,
    timeout_ms: u64,
) -> Result<(Vec<u8>, bool)> {
    let expected = response.content_length().map(|len| len as usize);
    if let Some(len) = expected.filter(|&len| len > cap) {
        tracing::debug!(content_length = len, cap, "reading only the start of the body");
    }

    let mut buf = Vec::with_capacity(expected.map_or(0, |len| len.min(cap)));

    while let Some(chunk) = response.chunk().await.map_err(|e| {
        if e.is_timeout() {
            WorkspaceError::RequestTimeout(timeout_ms)
        } else {
            WorkspaceError::RequestFailed(e.to_string())
        }
    })? {
        buf.extend_from_slice(&chunk);
        if buf.len() > cap {
            buf.truncate(cap);
            return Ok((buf, true));
        }
    }

    Ok((buf, false))
}

/// Decode as UTF-8, dropping a character split by the byte cap.
fn decode_prefix(bytes: &[u8], capped: bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) if capped && e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Parse a URL, accepting only http and https.
fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| WorkspaceError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WorkspaceError::InvalidUrl(format!(
            "Unsupported scheme: {other}"
        ))),
    }
}

fn build_headers(headers: Option<&HashMap<String, String>>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.into_iter().flatten() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| WorkspaceError::InvalidHeader(format!("bad name: {name}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| WorkspaceError::InvalidHeader(format!("bad value for {name}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// First `limit` characters of `text`, and whether anything was cut.
fn preview(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert_eq!(validate_url("https://example.com/a").unwrap().scheme(), "https");
        assert_eq!(validate_url("http://localhost:8080").unwrap().scheme(), "http");
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        for bad in ["ftp://example.com", "file:///etc/passwd", "not a url", ""] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.code(), "INVALID_URL", "{bad:?}");
        }
    }

    #[test]
    fn test_build_headers() {
        let headers = HashMap::from([
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Trace".to_string(), "abc".to_string()),
        ]);
        let map = build_headers(Some(&headers)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["accept"], "application/json");

        assert!(build_headers(None).unwrap().is_empty());
    }

    #[test]
    fn test_build_headers_invalid() {
        let bad_name = HashMap::from([("bad header".to_string(), "x".to_string())]);
        assert_eq!(build_headers(Some(&bad_name)).unwrap_err().code(), "INVALID_HEADER");

        let bad_value = HashMap::from([("X-Ok".to_string(), "line\nbreak".to_string())]);
        assert_eq!(build_headers(Some(&bad_value)).unwrap_err().code(), "INVALID_HEADER");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello", 10), ("hello".to_string(), false));
        assert_eq!(preview("hello", 5), ("hello".to_string(), false));
        assert_eq!(preview("hello", 3), ("hel".to_string(), true));
        assert_eq!(preview("日本語テキスト", 3), ("日本語".to_string(), true));
        assert_eq!(preview("", 0), (String::new(), false));
    }

    #[test]
    fn test_body_cap() {
        assert_eq!(body_cap(0), 0);
        assert_eq!(body_cap(1_000), 4_000);
        assert_eq!(body_cap(usize::MAX), MAX_BODY_BYTES);
    }

    #[test]
    fn test_decode_prefix_drops_split_character() {
        let bytes = "日本".as_bytes();
        assert_eq!(decode_prefix(&bytes[..4], true), "日");
        assert_eq!(decode_prefix(bytes, false), "日本");
        assert_eq!(decode_prefix(&bytes[..4], false), "日\u{FFFD}");
    }

    #[test]
    fn test_method_defaults_to_get() {
        let input: WebRequestInput = serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(input.method, HttpMethod::Get);

        let input: WebRequestInput =
            serde_json::from_str(r#"{"url": "https://example.com", "method": "POST"}"#).unwrap();
        assert_eq!(input.method, HttpMethod::Post);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_sending() {
        let config = Config::default();
        let client = reqwest::Client::new();
        let input = WebRequestInput {
            url: "gopher://example.com".to_string(),
            method: HttpMethod::Get,
            headers: None,
            data: None,
        };

        let err = run(&config, &client, input).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_URL");
    }
}
