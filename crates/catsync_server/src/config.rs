//! Server configuration.

use catsync_protocol::MAX_PAGE_SIZE;

/// Page size used when a list request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Configuration for the catalog server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest page a list request may ask for. Larger requests are capped.
    pub max_page_size: u32,
    /// Page size when the request omits one.
    pub default_page_size: u32,
    /// Whether responses omit empty array values.
    pub drop_empty_arrays: bool,
    /// API key expected as a bearer token, if any.
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            drop_empty_arrays: true,
            api_key: None,
        }
    }

    /// Sets the maximum page size.
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the default page size.
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets whether responses omit empty array values.
    pub fn with_drop_empty_arrays(mut self, drop: bool) -> Self {
        self.drop_empty_arrays = drop;
        self
    }

    /// Requires requests to carry this API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
