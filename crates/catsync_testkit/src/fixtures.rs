//! Test fixtures and loopback helpers.
//!
//! Wires the engine's HTTP client to an in-process reference server, so the
//! full request/response path runs without a socket.

use crate::generators::RemoteSeed;
use catsync_engine::{
    CatalogConfig, HttpCatalogClient, HttpResponse, LoopbackClient, LoopbackServer, Method,
    Reconciler, RetryConfig,
};
use catsync_protocol::{DesiredState, EntrySpec, ExternalId, RemoteEntry};
use catsync_server::{CatalogServer, ServerConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Catalog type registered on every test server.
pub const TEST_CATALOG_TYPE: &str = "ct-services";

/// API key shared by the test server and client.
pub const TEST_API_KEY: &str = "test-api-key";

/// Base URL the loopback client pretends to talk to.
pub const TEST_BASE_URL: &str = "http://catalog.test";

/// A server shared between a test and the loopback client.
#[derive(Clone)]
pub struct SharedServer(pub Arc<CatalogServer>);

impl LoopbackServer for SharedServer {
    fn handle(
        &self,
        method: Method,
        target: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> HttpResponse {
        let (status, body) = self.0.handle(method.as_str(), target, authorization, body);
        HttpResponse { status, body }
    }
}

/// HTTP catalog client routed to a [`SharedServer`].
pub type LoopbackCatalogClient = HttpCatalogClient<LoopbackClient<SharedServer>>;

/// Client configuration for tests: authenticated, fast retries, no jitter.
pub fn test_catalog_config() -> CatalogConfig {
    CatalogConfig::new(TEST_BASE_URL)
        .with_api_key(TEST_API_KEY)
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(5))
                .without_jitter(),
        )
}

/// Server configuration matching [`test_catalog_config`].
pub fn test_server_config() -> ServerConfig {
    ServerConfig::default().with_api_key(TEST_API_KEY)
}

/// A reference server plus a reconciler talking to it.
pub struct TestCatalog {
    /// The server.
    pub server: Arc<CatalogServer>,
    /// Reconciler wired to the server.
    pub reconciler: Reconciler<LoopbackCatalogClient>,
}

impl TestCatalog {
    /// Creates a fixture with the default test configurations.
    pub fn new() -> Self {
        Self::with_configs(test_server_config(), test_catalog_config())
    }

    /// Creates a fixture with custom configurations.
    pub fn with_configs(server_config: ServerConfig, catalog_config: CatalogConfig) -> Self {
        let server = Arc::new(CatalogServer::new(server_config));
        server.add_catalog_type(TEST_CATALOG_TYPE);

        let loopback = LoopbackClient::new(SharedServer(Arc::clone(&server)));
        let client = HttpCatalogClient::new(catalog_config.clone(), loopback)
            .expect("Failed to create loopback client");
        let reconciler =
            Reconciler::new(catalog_config, client).expect("Failed to create reconciler");

        Self { server, reconciler }
    }

    /// Seeds one entry in the test catalog type. Returns its ID.
    pub fn seed(&self, external_id: Option<&str>, spec: &EntrySpec) -> String {
        self.server
            .seed_entry(TEST_CATALOG_TYPE, external_id, spec)
            .expect("Failed to seed entry")
    }

    /// Seeds every entry of a [`RemoteSeed`].
    pub fn seed_remote(&self, seed: &RemoteSeed) {
        for (external_id, spec) in &seed.owned {
            self.seed(Some(external_id), spec);
        }
        for spec in &seed.unowned {
            self.seed(None, spec);
        }
    }

    /// Returns every stored entry of the test catalog type.
    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.server.entries(TEST_CATALOG_TYPE)
    }

    /// Returns the external IDs currently stored, ignoring unowned entries.
    pub fn owned_external_ids(&self) -> BTreeSet<ExternalId> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.external_id)
            .collect()
    }

    /// Number of entries without an external ID.
    pub fn unowned_count(&self) -> usize {
        self.entries().iter().filter(|e| !e.is_owned()).count()
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Desired state `{ext-1: One, ext-2: Two}`.
pub fn scenario_desired() -> DesiredState {
    DesiredState::new()
        .with_entry("ext-1", EntrySpec::new("One"))
        .with_entry("ext-2", EntrySpec::new("Two"))
}

/// Seeds `ext-1` (matching [`scenario_desired`]) and the orphan `ext-3`.
pub fn seed_scenario(catalog: &TestCatalog) {
    catalog.seed(Some("ext-1"), &EntrySpec::new("One"));
    catalog.seed(Some("ext-3"), &EntrySpec::new("Orphan"));
}
