//! Client for the RAG backend's REST API.
//!
//! Covers the chat endpoints (blocking and streaming), document ingestion
//! and deletion, semantic search, backend settings, knowledge filters, and
//! first-run API key provisioning. Streaming chat emits events in the event
//! shape (`type` = `content`/`done`/`error`).

use std::path::Path;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{
    DEFAULT_TIMEOUT, build_http_client, map_request_error, normalize_base_url,
    process_error_response,
};
use crate::error::{Error, Result};
use crate::event::ChatEvent;
use crate::observability;
use crate::sse;

/// A complete (non-streamed) chat answer.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatReply {
    /// The assistant's answer text.
    #[serde(default)]
    pub response: String,
    /// Continuation id for follow-up turns.
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Retrieval sources the answer drew on.
    #[serde(default)]
    pub sources: serde_json::Value,
}

/// Outcome of a document ingestion request.
#[derive(Clone, Debug, Deserialize)]
pub struct IngestResult {
    #[serde(default)]
    pub status: Option<String>,
    /// Task id for async ingestion; absent when `wait` was requested.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub successful_files: Vec<String>,
    #[serde(default)]
    pub failed_files: Vec<String>,
}

/// One hit from a semantic search.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// Knobs for a search request. The default asks for the backend's defaults.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
}

/// A saved knowledge filter: a named, reusable retrieval query.
#[derive(Clone, Debug, Deserialize)]
pub struct KnowledgeFilter {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "queryData")]
    pub query_data: serde_json::Value,
}

#[derive(Deserialize)]
struct FilterSearchEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    filters: Vec<KnowledgeFilter>,
}

/// Client for a RAG backend.
#[derive(Debug, Clone)]
pub struct RagClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    supports_filter_mutation: bool,
}

impl RagClient {
    /// Create a new RAG client against `base_url` authenticating with
    /// `api_key` as a bearer token.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Self::with_options(base_url, api_key, None)
    }

    /// Create a new client with a custom timeout.
    pub fn with_options(base_url: &str, api_key: &str, timeout: Option<Duration>) -> Result<Self> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = build_http_client(timeout)?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: normalize_base_url(base_url),
            timeout,
            supports_filter_mutation: false,
        })
    }

    /// Enables the filter create/update/delete operations. Off by default:
    /// most deployments manage filters through their own UI and reject
    /// mutation from API clients.
    pub fn with_filter_mutation(mut self, enabled: bool) -> Self {
        self.supports_filter_mutation = enabled;
        self
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(self.url(path))
            .headers(self.default_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .get(self.url(path))
            .headers(self.default_headers())
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Send one chat message and wait for the complete answer.
    pub async fn chat(&self, message: &str, chat_id: Option<&str>) -> Result<ChatReply> {
        let mut body = json!({ "message": message });
        if let Some(chat_id) = chat_id {
            body["chat_id"] = json!(chat_id);
        }
        self.post_json("chat", &body).await
    }

    /// Send one chat message and stream the answer as it is generated.
    ///
    /// `chat_id` continues a prior conversation; `None` starts a new one.
    pub async fn chat_stream(
        &self,
        message: &str,
        chat_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<ChatEvent>>> {
        let mut body = json!({ "message": message });
        if let Some(chat_id) = chat_id {
            body["chat_id"] = json!(chat_id);
        }

        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(self.url("chat/stream"))
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
                serde_json::from_str::<ChatEvent>(&payload).map_err(Error::from)
            })
        }))
    }

    /// Upload a document for ingestion into the knowledge base.
    ///
    /// With `wait` the call blocks until processing finishes; otherwise the
    /// backend queues the document and returns a task id.
    pub async fn ingest_document(&self, path: &Path, wait: bool) -> Result<IngestResult> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::bad_request(format!("Invalid document path: {}", path.display()), None)
            })?
            .to_string();
        let contents = tokio::fs::read(path).await.map_err(|e| {
            Error::io(format!("Failed to read document {}: {e}", path.display()), e)
        })?;

        let part = multipart::Part::bytes(contents).file_name(filename);
        let form = multipart::Form::new()
            .part("file", part)
            .text("wait", if wait { "true" } else { "false" });

        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(self.url("documents"))
            .headers(self.default_headers())
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        response.json::<IngestResult>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Remove a previously ingested document. Returns true on success.
    pub async fn delete_document(&self, filename: &str) -> Result<bool> {
        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .delete(self.url(&format!("documents/{filename}")))
            .headers(self.default_headers())
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        Ok(true)
    }

    /// Run a semantic search over the knowledge base.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let mut body = serde_json::to_value(options)?;
        body["query"] = json!(query);
        self.post_json("search", &body).await
    }

    /// Fetch the backend's settings document.
    pub async fn get_settings(&self) -> Result<serde_json::Value> {
        self.get_json("settings").await
    }

    /// Replace backend settings with the provided document.
    pub async fn update_settings(&self, settings: &serde_json::Value) -> Result<serde_json::Value> {
        self.post_json("settings", settings).await
    }

    /// Search saved knowledge filters by name. An empty query lists all.
    pub async fn search_filters(&self, query: &str) -> Result<Vec<KnowledgeFilter>> {
        let body = json!({ "query": query, "limit": 20 });
        let envelope: FilterSearchEnvelope =
            self.post_json("knowledge-filters/search", &body).await?;
        if !envelope.success {
            return Err(Error::unknown("filter search reported failure"));
        }
        Ok(envelope.filters)
    }

    /// Fetch one knowledge filter by id.
    pub async fn get_filter(&self, filter_id: &str) -> Result<KnowledgeFilter> {
        self.get_json(&format!("knowledge-filters/{filter_id}"))
            .await
    }

    fn require_filter_mutation(&self) -> Result<()> {
        if self.supports_filter_mutation {
            Ok(())
        } else {
            Err(Error::bad_request(
                "filter mutation is not enabled for this client",
                None,
            ))
        }
    }

    /// Create a knowledge filter. Requires [`Self::with_filter_mutation`].
    pub async fn create_filter(
        &self,
        name: &str,
        description: &str,
        query_data: &serde_json::Value,
    ) -> Result<KnowledgeFilter> {
        self.require_filter_mutation()?;
        let body = json!({
            "name": name,
            "description": description,
            "queryData": query_data,
        });
        self.post_json("knowledge-filters", &body).await
    }

    /// Update a knowledge filter. Requires [`Self::with_filter_mutation`].
    pub async fn update_filter(
        &self,
        filter_id: &str,
        query_data: &serde_json::Value,
    ) -> Result<KnowledgeFilter> {
        self.require_filter_mutation()?;
        let body = json!({ "queryData": query_data });
        self.post_json(&format!("knowledge-filters/{filter_id}"), &body)
            .await
    }

    /// Delete a knowledge filter. Requires [`Self::with_filter_mutation`].
    pub async fn delete_filter(&self, filter_id: &str) -> Result<bool> {
        self.require_filter_mutation()?;
        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .delete(self.url(&format!("knowledge-filters/{filter_id}")))
            .headers(self.default_headers())
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        Ok(true)
    }

    /// Ask the backend to mint a fresh API key.
    ///
    /// This runs unauthenticated against `POST /keys` so a first-run client
    /// can bootstrap itself. Any non-success status surfaces as
    /// `Error::Provisioning` with the server's body verbatim.
    pub async fn provision_api_key(base_url: &str, name: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct KeyResponse {
            api_key: String,
        }

        let client = build_http_client(DEFAULT_TIMEOUT)?;
        let url = format!("{}keys", normalize_base_url(base_url));

        observability::CLIENT_REQUESTS.click();
        let response = client
            .post(&url)
            .json(&json!({ "name": name }))
            .send()
            .await
            .map_err(|e| map_request_error(e, DEFAULT_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provisioning(status.as_u16(), body));
        }
        let key: KeyResponse = response.json().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse key response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(key.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_mutation_gated_by_default() {
        let client = RagClient::new("http://localhost:3000", "key").unwrap();
        let err = client.require_filter_mutation().unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));

        let client = client.with_filter_mutation(true);
        assert!(client.require_filter_mutation().is_ok());
    }

    #[test]
    fn search_options_serialize_sparsely() {
        let options = SearchOptions {
            limit: Some(5),
            score_threshold: None,
            filter_id: None,
        };
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value, serde_json::json!({"limit": 5}));
    }

    #[test]
    fn filter_envelope_decodes() {
        let body = r#"{
            "success": true,
            "filters": [
                {"id": "f-1", "name": "docs", "queryData": {"query": "rust"}}
            ]
        }"#;
        let envelope: FilterSearchEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.filters.len(), 1);
        assert_eq!(envelope.filters[0].id, "f-1");
        assert_eq!(
            envelope.filters[0].query_data,
            serde_json::json!({"query": "rust"})
        );
    }

    #[test]
    fn chat_reply_tolerates_missing_fields() {
        let reply: ChatReply = serde_json::from_str(r#"{"response": "hi"}"#).unwrap();
        assert_eq!(reply.response, "hi");
        assert!(reply.chat_id.is_none());
    }
}
