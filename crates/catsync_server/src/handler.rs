//! Request handlers for catalog entry endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::{CatalogStore, EntryFields, StoredEntry};
use catsync_protocol::{
    CatalogEntryPayload, CatalogEntryWire, EntryEnvelope, ListEntriesResponse, PaginationMeta,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Entry store (shared across all handlers).
    pub store: Arc<CatalogStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<CatalogStore>) -> Self {
        Self { config, store }
    }
}

/// Query parameters of a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Catalog type to list.
    pub catalog_type_id: String,
    /// Requested page size.
    pub page_size: Option<u32>,
    /// Cursor: list entries with IDs greater than this.
    pub after: Option<String>,
}

impl ListQuery {
    /// Parses a URL query string.
    pub fn parse(query: &str) -> ServerResult<Self> {
        let mut catalog_type_id = None;
        let mut page_size = None;
        let mut after = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "catalog_type_id" => catalog_type_id = Some(value.into_owned()),
                "page_size" => {
                    let size = value.parse::<u32>().map_err(|_| {
                        ServerError::InvalidRequest(format!("page_size is not a number: {value}"))
                    })?;
                    page_size = Some(size);
                }
                "after" if !value.is_empty() => after = Some(value.into_owned()),
                _ => {}
            }
        }

        let catalog_type_id = catalog_type_id.ok_or_else(|| {
            ServerError::Validation("catalog_type_id query parameter is required".into())
        })?;
        Ok(Self {
            catalog_type_id,
            page_size,
            after,
        })
    }
}

/// Handler for catalog entry requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a list request.
    pub fn handle_list(&self, query: ListQuery) -> ServerResult<ListEntriesResponse> {
        let config = &self.context.config;
        let page_size = match query.page_size {
            Some(0) => {
                return Err(ServerError::Validation("page_size must be at least 1".into()));
            }
            Some(size) => size.min(config.max_page_size),
            None => config.default_page_size,
        };

        let entries = self.context.store.list(
            &query.catalog_type_id,
            query.after.as_deref(),
            page_size as usize,
        )?;
        let after = entries.last().map(|e| e.id.clone());
        debug!(
            catalog_type_id = %query.catalog_type_id,
            count = entries.len(),
            "listed catalog entries"
        );

        Ok(ListEntriesResponse {
            catalog_entries: entries.iter().map(|e| self.render(e)).collect(),
            pagination_meta: PaginationMeta { after, page_size },
        })
    }

    /// Handles a show request.
    pub fn handle_show(&self, id: &str) -> ServerResult<EntryEnvelope> {
        let entry = self.context.store.get(id)?;
        Ok(self.envelope(&entry))
    }

    /// Handles a create request.
    pub fn handle_create(&self, payload: CatalogEntryPayload) -> ServerResult<EntryEnvelope> {
        let catalog_type_id = payload
            .catalog_type_id
            .clone()
            .ok_or_else(|| ServerError::Validation("catalog_type_id is required".into()))?;
        let entry = self
            .context
            .store
            .create(&catalog_type_id, fields_from_payload(payload)?)?;
        debug!(entry_id = %entry.id, catalog_type_id = %catalog_type_id, "created catalog entry");
        Ok(self.envelope(&entry))
    }

    /// Handles an update request.
    pub fn handle_update(
        &self,
        id: &str,
        payload: CatalogEntryPayload,
    ) -> ServerResult<EntryEnvelope> {
        let entry = self.context.store.update(id, fields_from_payload(payload)?)?;
        debug!(entry_id = %entry.id, "updated catalog entry");
        Ok(self.envelope(&entry))
    }

    /// Handles a delete request.
    pub fn handle_delete(&self, id: &str) -> ServerResult<()> {
        self.context.store.delete(id)?;
        debug!(entry_id = %id, "deleted catalog entry");
        Ok(())
    }

    fn render(&self, entry: &StoredEntry) -> CatalogEntryWire {
        entry.to_wire(self.context.config.drop_empty_arrays)
    }

    fn envelope(&self, entry: &StoredEntry) -> EntryEnvelope {
        EntryEnvelope {
            catalog_entry: self.render(entry),
        }
    }
}

/// An attribute sent with neither `value` nor `array_value` is unbound.
fn fields_from_payload(payload: CatalogEntryPayload) -> ServerResult<EntryFields> {
    let mut attributes = BTreeMap::new();
    for (id, value) in payload.attribute_values {
        if let Some(binding) = value.into_binding()? {
            attributes.insert(id, binding);
        }
    }

    Ok(EntryFields {
        name: payload.name,
        external_id: payload.external_id,
        aliases: payload.aliases,
        rank: payload.rank,
        attributes,
    })
}
