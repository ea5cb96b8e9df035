//! In-memory catalog entry store.

use crate::error::{ServerError, ServerResult};
use catsync_protocol::{
    AttributeBinding, AttributeValuePayload, CatalogEntryWire, EntrySpec, RemoteEntry,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Writable fields of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    /// Display name.
    pub name: String,
    /// External ID.
    pub external_id: Option<String>,
    /// Aliases.
    pub aliases: Vec<String>,
    /// Rank. `None` keeps the stored rank on update and means 0 on create.
    pub rank: Option<i32>,
    /// Attribute bindings.
    pub attributes: BTreeMap<String, AttributeBinding>,
}

impl EntryFields {
    /// Builds fields from a spec.
    pub fn from_spec(external_id: Option<&str>, spec: &EntrySpec) -> Self {
        Self {
            name: spec.name.clone(),
            external_id: external_id.map(str::to_string),
            aliases: spec.aliases.clone(),
            rank: spec.rank,
            attributes: spec.attributes.clone(),
        }
    }
}

/// An entry as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Generated ID.
    pub id: String,
    /// Owning catalog type.
    pub catalog_type_id: String,
    /// Display name.
    pub name: String,
    /// External ID.
    pub external_id: Option<String>,
    /// Aliases.
    pub aliases: Vec<String>,
    /// Rank.
    pub rank: i32,
    /// Attribute bindings, empty arrays included.
    pub attributes: BTreeMap<String, AttributeBinding>,
}

impl StoredEntry {
    /// Renders the entry as a response record.
    ///
    /// With `drop_empty_arrays` an empty array binding is rendered with
    /// neither `value` nor `array_value`, as the real service does.
    pub fn to_wire(&self, drop_empty_arrays: bool) -> CatalogEntryWire {
        let attribute_values = self
            .attributes
            .iter()
            .map(|(id, binding)| {
                let payload = if drop_empty_arrays && binding.is_empty_array() {
                    AttributeValuePayload::default()
                } else {
                    AttributeValuePayload::from(binding)
                };
                (id.clone(), payload)
            })
            .collect();

        CatalogEntryWire {
            id: self.id.clone(),
            catalog_type_id: self.catalog_type_id.clone(),
            name: self.name.clone(),
            external_id: self.external_id.clone(),
            aliases: Some(self.aliases.clone()),
            rank: Some(self.rank),
            attribute_values: Some(attribute_values),
        }
    }

    /// Converts to the engine's view of a remote entry, without dropping
    /// anything.
    pub fn to_remote(&self) -> RemoteEntry {
        RemoteEntry {
            id: self.id.clone(),
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            rank: Some(self.rank),
            attributes: self
                .attributes
                .iter()
                .map(|(id, binding)| (id.clone(), Some(binding.clone())))
                .collect(),
        }
    }
}

/// Catalog types and their entries.
///
/// Entries are kept sorted by ID, which is also the list order and the
/// cursor order.
#[derive(Debug, Default)]
pub struct CatalogStore {
    catalog_types: RwLock<BTreeSet<String>>,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

impl CatalogStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a catalog type. Returns false if it already existed.
    pub fn add_catalog_type(&self, catalog_type_id: impl Into<String>) -> bool {
        self.catalog_types.write().insert(catalog_type_id.into())
    }

    /// Returns true if the catalog type exists.
    pub fn has_catalog_type(&self, catalog_type_id: &str) -> bool {
        self.catalog_types.read().contains(catalog_type_id)
    }

    /// Lists up to `limit` entries of a type with IDs greater than `after`.
    pub fn list(
        &self,
        catalog_type_id: &str,
        after: Option<&str>,
        limit: usize,
    ) -> ServerResult<Vec<StoredEntry>> {
        self.require_catalog_type(catalog_type_id)?;
        let entries = self.entries.read();
        Ok(entries
            .values()
            .filter(|e| e.catalog_type_id == catalog_type_id)
            .filter(|e| after.map_or(true, |a| e.id.as_str() > a))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Returns every entry of a type.
    pub fn entries(&self, catalog_type_id: &str) -> Vec<StoredEntry> {
        self.entries
            .read()
            .values()
            .filter(|e| e.catalog_type_id == catalog_type_id)
            .cloned()
            .collect()
    }

    /// Looks up an entry.
    pub fn get(&self, id: &str) -> ServerResult<StoredEntry> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::not_found("catalog entry", id))
    }

    /// Creates an entry.
    pub fn create(&self, catalog_type_id: &str, fields: EntryFields) -> ServerResult<StoredEntry> {
        self.require_catalog_type(catalog_type_id)?;
        validate_name(&fields.name)?;

        let mut entries = self.entries.write();
        ensure_unique_external_id(&entries, catalog_type_id, None, fields.external_id.as_deref())?;

        let entry = StoredEntry {
            id: Uuid::new_v4().to_string(),
            catalog_type_id: catalog_type_id.to_string(),
            name: fields.name,
            external_id: fields.external_id,
            aliases: fields.aliases,
            rank: fields.rank.unwrap_or(0),
            attributes: fields.attributes,
        };
        entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Replaces the writable fields of an entry.
    pub fn update(&self, id: &str, fields: EntryFields) -> ServerResult<StoredEntry> {
        validate_name(&fields.name)?;

        let mut entries = self.entries.write();
        let catalog_type_id = entries
            .get(id)
            .map(|e| e.catalog_type_id.clone())
            .ok_or_else(|| ServerError::not_found("catalog entry", id))?;
        ensure_unique_external_id(
            &entries,
            &catalog_type_id,
            Some(id),
            fields.external_id.as_deref(),
        )?;

        let entry = entries
            .get_mut(id)
            .ok_or_else(|| ServerError::not_found("catalog entry", id))?;
        entry.name = fields.name;
        entry.external_id = fields.external_id;
        entry.aliases = fields.aliases;
        if let Some(rank) = fields.rank {
            entry.rank = rank;
        }
        entry.attributes = fields.attributes;
        Ok(entry.clone())
    }

    /// Deletes an entry.
    pub fn delete(&self, id: &str) -> ServerResult<StoredEntry> {
        self.entries
            .write()
            .remove(id)
            .ok_or_else(|| ServerError::not_found("catalog entry", id))
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn require_catalog_type(&self, catalog_type_id: &str) -> ServerResult<()> {
        if self.has_catalog_type(catalog_type_id) {
            Ok(())
        } else {
            Err(ServerError::not_found("catalog type", catalog_type_id))
        }
    }
}

fn validate_name(name: &str) -> ServerResult<()> {
    if name.trim().is_empty() {
        return Err(ServerError::Validation("name must not be blank".into()));
    }
    Ok(())
}

fn ensure_unique_external_id(
    entries: &BTreeMap<String, StoredEntry>,
    catalog_type_id: &str,
    except_id: Option<&str>,
    external_id: Option<&str>,
) -> ServerResult<()> {
    let Some(external_id) = external_id else {
        return Ok(());
    };
    let taken = entries.values().any(|e| {
        e.catalog_type_id == catalog_type_id
            && e.external_id.as_deref() == Some(external_id)
            && Some(e.id.as_str()) != except_id
    });
    if taken {
        return Err(ServerError::Validation(format!(
            "external_id {external_id} is already used in catalog type {catalog_type_id}"
        )));
    }
    Ok(())
}
