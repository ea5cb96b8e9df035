//! Main catalog server.

use crate::auth::ApiKeyValidator;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, ListQuery, RequestHandler};
use crate::store::{CatalogStore, EntryFields};
use catsync_protocol::{decode_json, encode_json, CatalogEntryPayload, EntrySpec, RemoteEntry};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

const ENTRIES_PATH: &str = "/v2/catalog_entries";

/// The catalog server.
///
/// Serves the catalog entries API from memory. It does not own a socket:
/// callers pass each request to [`CatalogServer::handle`].
///
/// # Example
///
/// ```
/// use catsync_server::{CatalogServer, ServerConfig};
///
/// let server = CatalogServer::new(ServerConfig::default());
/// server.add_catalog_type("ct-services");
///
/// let (status, _body) = server.handle(
///     "GET",
///     "/v2/catalog_entries?catalog_type_id=ct-services",
///     None,
///     b"",
/// );
/// assert_eq!(status, 200);
/// ```
pub struct CatalogServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    validator: ApiKeyValidator,
    requests: AtomicUsize,
    injected: Mutex<VecDeque<u16>>,
}

impl CatalogServer {
    /// Creates a new catalog server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(CatalogStore::new()))
    }

    /// Creates a catalog server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<CatalogStore>) -> Self {
        let validator = ApiKeyValidator::new(config.api_key.clone());
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            validator,
            requests: AtomicUsize::new(0),
            injected: Mutex::new(VecDeque::new()),
        }
    }

    /// Handles one HTTP request.
    ///
    /// `target` is the path plus optional query string. Returns the status and
    /// the JSON response body (empty for `204`).
    pub fn handle(
        &self,
        method: &str,
        target: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> (u16, Vec<u8>) {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let result = self
            .validator
            .validate(authorization)
            .and_then(|()| self.take_injected())
            .and_then(|()| self.route(method, target, body));

        match result {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    warn!(method, target, error = %err, "catalog request failed");
                }
                let body = encode_json("error response", &err.to_response()).unwrap_or_default();
                (err.status(), body)
            }
        }
    }

    fn route(&self, method: &str, target: &str, body: &[u8]) -> ServerResult<(u16, Vec<u8>)> {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let rest = path
            .strip_prefix(ENTRIES_PATH)
            .ok_or_else(|| ServerError::not_found("route", path))?;
        let id = rest.strip_prefix('/').filter(|id| !id.is_empty());

        match (method, id) {
            ("GET", None) if rest.is_empty() => {
                let response = self.handler.handle_list(ListQuery::parse(query)?)?;
                ok(200, &response)
            }
            ("POST", None) if rest.is_empty() => {
                let payload: CatalogEntryPayload = decode_json("catalog entry", body)?;
                ok(201, &self.handler.handle_create(payload)?)
            }
            ("GET", Some(id)) => ok(200, &self.handler.handle_show(id)?),
            ("PUT", Some(id)) => {
                let payload: CatalogEntryPayload = decode_json("catalog entry", body)?;
                ok(200, &self.handler.handle_update(id, payload)?)
            }
            ("DELETE", Some(id)) => {
                self.handler.handle_delete(id)?;
                Ok((204, Vec::new()))
            }
            _ if !rest.is_empty() && id.is_none() => Err(ServerError::not_found("route", path)),
            _ => Err(ServerError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn take_injected(&self) -> ServerResult<()> {
        match self.injected.lock().pop_front() {
            Some(status) => Err(ServerError::Injected(status)),
            None => Ok(()),
        }
    }

    /// Makes the next requests fail with the given statuses, in order.
    pub fn inject_failures(&self, statuses: impl IntoIterator<Item = u16>) {
        self.injected.lock().extend(statuses);
    }

    /// Registers a catalog type.
    pub fn add_catalog_type(&self, catalog_type_id: impl Into<String>) -> bool {
        self.context.store.add_catalog_type(catalog_type_id)
    }

    /// Stores an entry directly, as if another client had created it.
    ///
    /// Pass `None` as external ID to create drift the engine does not own.
    pub fn seed_entry(
        &self,
        catalog_type_id: &str,
        external_id: Option<&str>,
        spec: &EntrySpec,
    ) -> ServerResult<String> {
        let entry = self
            .context
            .store
            .create(catalog_type_id, EntryFields::from_spec(external_id, spec))?;
        Ok(entry.id)
    }

    /// Returns every stored entry of a type, empty arrays included.
    pub fn entries(&self, catalog_type_id: &str) -> Vec<RemoteEntry> {
        self.context
            .store
            .entries(catalog_type_id)
            .iter()
            .map(|e| e.to_remote())
            .collect()
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.context.store
    }

    /// Returns the number of requests handled so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn ok<T: serde::Serialize>(status: u16, message: &T) -> ServerResult<(u16, Vec<u8>)> {
    Ok((status, encode_json("response", message)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catsync_protocol::{EntryEnvelope, ErrorResponse, ListEntriesResponse};

    fn server() -> CatalogServer {
        let server = CatalogServer::new(ServerConfig::default());
        server.add_catalog_type("ct");
        server
    }

    fn create_body(external_id: &str, name: &str) -> Vec<u8> {
        let payload = CatalogEntryPayload::create("ct", external_id, &EntrySpec::new(name));
        serde_json::to_vec(&payload).unwrap()
    }

    #[test]
    fn server_lifecycle() {
        let server = server();
        assert_eq!(server.request_count(), 0);
        assert!(server.entries("ct").is_empty());
        assert!(!server.add_catalog_type("ct"));
    }

    #[test]
    fn full_entry_flow() {
        let server = server();

        let body = create_body("ext-1", "One");
        let (status, body) = server.handle("POST", ENTRIES_PATH, None, &body);
        assert_eq!(status, 201);
        let created: EntryEnvelope = serde_json::from_slice(&body).unwrap();
        let id = created.catalog_entry.id;

        let (status, body) = server.handle(
            "GET",
            "/v2/catalog_entries?catalog_type_id=ct&page_size=10",
            None,
            b"",
        );
        assert_eq!(status, 200);
        let page: ListEntriesResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(page.catalog_entries.len(), 1);
        assert_eq!(page.pagination_meta.after.as_deref(), Some(id.as_str()));

        let path = format!("{ENTRIES_PATH}/{id}");
        let update = serde_json::to_vec(&CatalogEntryPayload::update(
            "ext-1",
            &EntrySpec::new("Uno"),
        ))
        .unwrap();
        let (status, _) = server.handle("PUT", &path, None, &update);
        assert_eq!(status, 200);
        assert_eq!(server.entries("ct")[0].name, "Uno");

        let (status, body) = server.handle("DELETE", &path, None, b"");
        assert_eq!(status, 204);
        assert!(body.is_empty());

        let (status, body) = server.handle("GET", &path, None, b"");
        assert_eq!(status, 404);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, "not_found");
        assert_eq!(server.request_count(), 5);
    }

    #[test]
    fn routing_errors() {
        let server = server();
        assert_eq!(server.handle("GET", "/v1/other", None, b"").0, 404);
        assert_eq!(server.handle("PATCH", ENTRIES_PATH, None, b"").0, 405);
        assert_eq!(server.handle("DELETE", ENTRIES_PATH, None, b"").0, 405);
        assert_eq!(server.handle("POST", ENTRIES_PATH, None, b"{not json").0, 400);
        assert_eq!(server.handle("GET", "/v2/catalog_entriesX", None, b"").0, 404);
    }

    #[test]
    fn api_key_is_enforced() {
        let server = CatalogServer::new(ServerConfig::default().with_api_key("k"));
        server.add_catalog_type("ct");
        let target = "/v2/catalog_entries?catalog_type_id=ct";

        let (status, body) = server.handle("GET", target, None, b"");
        assert_eq!(status, 401);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, "authentication_error");

        assert_eq!(server.handle("GET", target, Some("Bearer k"), b"").0, 200);
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let server = server();
        server.inject_failures([429, 503]);
        let target = "/v2/catalog_entries?catalog_type_id=ct";

        assert_eq!(server.handle("GET", target, None, b"").0, 429);
        assert_eq!(server.handle("GET", target, None, b"").0, 503);
        assert_eq!(server.handle("GET", target, None, b"").0, 200);
    }

    #[test]
    fn seeded_entries_are_visible() {
        let server = server();
        let id = server.seed_entry("ct", None, &EntrySpec::new("Drift")).unwrap();
        let entries = server.entries("ct");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert!(!entries[0].is_owned());
        assert!(server.seed_entry("missing", None, &EntrySpec::new("X")).is_err());
    }
}
