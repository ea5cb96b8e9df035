//! HTTP transport implementation.
//!
//! This module provides an HTTP-based [`CatalogClient`]. The actual HTTP
//! client is abstracted via a trait to allow different implementations
//! (reqwest, in-process loopback, scripted test clients).
//!
//! Retries for rate limiting and transient server failures happen here, below
//! the reconciliation engine, which sees every call as succeed-or-fail.

use crate::client::{CatalogClient, ListPage};
use crate::config::CatalogConfig;
use crate::error::{ReconcileError, ReconcileResult};
use catsync_protocol::{
    decode_json, encode_json, CatalogEntryPayload, EntryEnvelope, EntrySpec, ListEntriesResponse,
    RemoteEntry,
};
use std::thread;
use tracing::{debug, warn};
use url::Url;

const ENTRIES_PATH: &str = "v2/catalog_entries";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response returned by an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as lossy UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// no response was received at all; any received status is returned as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// HTTP-based catalog client.
///
/// Uses JSON bodies and bearer authentication.
pub struct HttpCatalogClient<C: HttpClient> {
    config: CatalogConfig,
    base_url: Url,
    client: C,
}

impl<C: HttpClient> HttpCatalogClient<C> {
    /// Creates a new HTTP catalog client.
    pub fn new(config: CatalogConfig, client: C) -> ReconcileResult<Self> {
        config.validate()?;
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ReconcileError::InvalidConfig(format!("invalid base_url: {e}")))?;
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Returns the underlying HTTP client.
    pub fn http_client(&self) -> &C {
        &self.client
    }

    fn endpoint(&self, entry_id: Option<&str>) -> ReconcileResult<Url> {
        let mut url = self
            .base_url
            .join(ENTRIES_PATH)
            .map_err(|e| ReconcileError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if let Some(id) = entry_id {
            url.path_segments_mut()
                .map_err(|()| ReconcileError::InvalidConfig("base_url cannot be a base".into()))?
                .push(id);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> HttpRequest {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(key) = &self.config.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {key}")));
        }
        HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        }
    }

    /// Sends a request, retrying transient failures per the retry config.
    ///
    /// A create (`POST`) is only retried on `429`. After a transport error or
    /// a 5xx it may already have been applied, and a repeated create would be
    /// rejected as a duplicate external ID.
    fn send(&self, request: &HttpRequest) -> ReconcileResult<HttpResponse> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            let delay = retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            let err = match self.client.send(request) {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => ReconcileError::remote(response.status, response.body_text()),
                Err(message) => ReconcileError::transport_retryable(message),
            };

            attempt += 1;
            let retryable = may_retry(request.method, &err);
            if !retryable || attempt >= retry.max_attempts {
                if retryable {
                    warn!(
                        method = request.method.as_str(),
                        url = %request.url,
                        attempts = attempt,
                        "giving up after retries"
                    );
                }
                return Err(err);
            }

            debug!(
                method = request.method.as_str(),
                url = %request.url,
                attempt,
                error = %err,
                "retrying request"
            );
        }
    }
}

fn may_retry(method: Method, err: &ReconcileError) -> bool {
    match method {
        Method::Post => err.status() == Some(429),
        _ => err.is_retryable(),
    }
}

impl<C: HttpClient> CatalogClient for HttpCatalogClient<C> {
    fn list(
        &self,
        catalog_type_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> ReconcileResult<ListPage> {
        let mut url = self.endpoint(None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("catalog_type_id", catalog_type_id)
                .append_pair("page_size", &page_size.to_string());
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }

        let response = self.send(&self.request(Method::Get, url, None))?;
        let page: ListEntriesResponse = decode_json("list entries response", &response.body)?;

        let entries = page
            .catalog_entries
            .into_iter()
            .map(|wire| wire.into_remote())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListPage {
            entries,
            next_cursor: page.pagination_meta.after,
        })
    }

    fn create(
        &self,
        catalog_type_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry> {
        let payload = CatalogEntryPayload::create(catalog_type_id, external_id, spec);
        let body = encode_json("create entry request", &payload)?;
        let url = self.endpoint(None)?;
        let response = self.send(&self.request(Method::Post, url, Some(body)))?;
        let envelope: EntryEnvelope = decode_json("create entry response", &response.body)?;
        Ok(envelope.catalog_entry.into_remote()?)
    }

    fn update(
        &self,
        entry_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry> {
        let payload = CatalogEntryPayload::update(external_id, spec);
        let body = encode_json("update entry request", &payload)?;
        let url = self.endpoint(Some(entry_id))?;
        let response = self.send(&self.request(Method::Put, url, Some(body)))?;
        let envelope: EntryEnvelope = decode_json("update entry response", &response.body)?;
        Ok(envelope.catalog_entry.into_remote()?)
    }

    fn delete(&self, entry_id: &str) -> ReconcileResult<()> {
        let url = self.endpoint(Some(entry_id))?;
        self.send(&self.request(Method::Delete, url, None))?;
        Ok(())
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request addressed to `target` (path plus query string).
    fn handle(
        &self,
        method: Method,
        target: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a catalog server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let url = Url::parse(&request.url).map_err(|e| e.to_string())?;
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let body = request.body.as_deref().unwrap_or_default();

        Ok(self
            .server
            .handle(request.method, &target, request.header("Authorization"), body))
    }
}
