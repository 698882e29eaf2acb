//! Client for the OpenAI-compatible responses endpoint.
//!
//! This backend variant exposes a `/responses` endpoint that streams chunks
//! in the poll shape (top-level `id`, string-or-object `delta`,
//! `status == "completed"` terminal marker). Shared HTTP plumbing for both
//! backend variants also lives here.

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::event::ResponseChunk;
use crate::observability;
use crate::sse;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the shared reqwest client with the crate's default timeout policy.
pub(crate) fn build_http_client(timeout: Duration) -> Result<ReqwestClient> {
    ReqwestClient::builder().timeout(timeout).build().map_err(|e| {
        Error::http_client(
            format!("Failed to build HTTP client: {e}"),
            Some(Box::new(e)),
        )
    })
}

/// Maps a reqwest send error into the crate's connectivity taxonomy.
pub(crate) fn map_request_error(e: reqwest::Error, timeout: Duration) -> Error {
    observability::CLIENT_REQUEST_ERRORS.click();
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {e}"),
            Some(timeout.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
    }
}

/// Process API response errors and convert to our Error type.
pub(crate) async fn process_error_response(response: Response) -> Error {
    let status = response.status();
    let status_code = status.as_u16();

    // Get headers we might need for error processing
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .map(String::from);

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    // Try to parse error response body
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let error_body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };

    // Try to parse as JSON first
    let parsed_error = serde_json::from_str::<ErrorResponse>(&error_body).ok();
    let error_type = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.error_type.clone());
    let error_message = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| error_body.clone());
    let error_param = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.param.clone());

    // Map HTTP status code to appropriate error type
    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 | 403 => Error::authentication(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message, request_id),
    }
}

/// Normalizes a base URL so endpoint paths can be appended directly.
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    let mut base = base_url.trim_end_matches('/').to_string();
    base.push('/');
    base
}

/// Client for an OpenAI-compatible responses backend.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl ResponsesClient {
    /// Create a new responses client.
    ///
    /// `base_url` is the API root (the `/responses` path is appended);
    /// `model` identifies the flow/model the backend should run.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        Self::with_options(base_url, api_key, model, None)
    }

    /// Create a new client with a custom timeout.
    pub fn with_options(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = build_http_client(timeout)?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: normalize_base_url(base_url),
            model: model.to_string(),
            timeout,
        })
    }

    /// The model/flow id requests are issued against.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("x-api-key", value);
        }
        headers
    }

    /// Sends one user input and returns the streaming chunk sequence.
    ///
    /// `previous_response_id` links this request to a prior conversation
    /// turn; `None` starts a fresh conversation.
    pub async fn stream_response(
        &self,
        input: &str,
        previous_response_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<ResponseChunk>>> {
        let url = format!("{}responses", self.base_url);

        let mut body = json!({
            "model": self.model,
            "input": input,
            "stream": true,
        });
        if let Some(previous) = previous_response_id {
            body["previous_response_id"] = json!(previous);
        }

        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(&url)
            .headers(self.default_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }

        let frames = sse::data_frames(response.bytes_stream());
        Ok(frames.map(|frame| {
            frame.and_then(|payload| {
                serde_json::from_str::<ResponseChunk>(&payload).map_err(Error::from)
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = ResponsesClient::new("http://localhost:3000/api/v1", "key", "flow-1").unwrap();
        assert_eq!(client.base_url, "http://localhost:3000/api/v1/");
        assert_eq!(client.model(), "flow-1");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = ResponsesClient::with_options(
            "http://localhost:3000/api/v1/",
            "key",
            "flow-1",
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:3000/api/v1/");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("http://x"), "http://x/");
        assert_eq!(normalize_base_url("http://x/"), "http://x/");
        assert_eq!(normalize_base_url("http://x//"), "http://x/");
    }
}
