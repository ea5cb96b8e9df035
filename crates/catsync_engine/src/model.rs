//! Model builder: projects remote entries back into the caller's shape.

use catsync_protocol::{AttributeBinding, DesiredState, EntrySpec, ExternalId, RemoteEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// One owned entry as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryModel {
    /// Service ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Aliases in service order.
    pub aliases: Vec<String>,
    /// Sort rank.
    pub rank: Option<i32>,
    /// Attribute bindings keyed by attribute ID.
    pub attributes: BTreeMap<String, AttributeBinding>,
}

impl EntryModel {
    /// Converts the entry back into a spec.
    pub fn to_spec(&self) -> EntrySpec {
        EntrySpec {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            rank: self.rank,
            attributes: self.attributes.clone(),
        }
    }
}

/// All owned entries of a catalog type, keyed by external ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntriesModel {
    /// Catalog type the entries belong to.
    pub catalog_type_id: String,
    /// Owned entries.
    pub entries: BTreeMap<ExternalId, EntryModel>,
}

impl CatalogEntriesModel {
    /// Looks up an entry by external ID.
    pub fn get(&self, external_id: &str) -> Option<&EntryModel> {
        self.entries.get(external_id)
    }

    /// Number of owned entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no owned entries exist.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the model into a desired state that reproduces it.
    pub fn to_desired_state(&self) -> DesiredState {
        self.entries
            .iter()
            .map(|(external_id, entry)| (external_id.clone(), entry.to_spec()))
            .collect()
    }
}

/// Projects remote entries into a [`CatalogEntriesModel`].
///
/// Unowned entries are skipped. An attribute whose remote binding carries
/// neither a value nor an array value takes the binding from `prior` for the
/// same entry, or is omitted when there is none.
///
/// That fallback works around the service dropping empty arrays from its
/// responses, which makes "empty" and "unset" look the same. It only masks
/// absent bindings; any other drift from `prior` stays visible. If the service
/// ever reports empty arrays explicitly, remove it.
pub fn project(
    catalog_type_id: &str,
    remote: Vec<RemoteEntry>,
    prior: Option<&DesiredState>,
) -> CatalogEntriesModel {
    let mut entries = BTreeMap::new();

    for entry in remote {
        let Some(external_id) = entry.external_id else {
            continue;
        };
        let declared = prior.and_then(|p| p.get(&external_id));

        let mut attributes = BTreeMap::new();
        for (attribute_id, binding) in entry.attributes {
            let binding = match binding {
                Some(binding) => binding,
                None => match declared.and_then(|spec| spec.attributes.get(&attribute_id)) {
                    Some(previous) => {
                        debug!(
                            external_id = %external_id,
                            attribute_id = %attribute_id,
                            "masking absent attribute value with declared binding"
                        );
                        previous.clone()
                    }
                    None => continue,
                },
            };
            attributes.insert(attribute_id, binding);
        }

        entries.insert(
            external_id,
            EntryModel {
                id: entry.id,
                name: entry.name,
                aliases: entry.aliases,
                rank: entry.rank,
                attributes,
            },
        );
    }

    CatalogEntriesModel {
        catalog_type_id: catalog_type_id.to_string(),
        entries,
    }
}

/// Remote state that still disagrees with desired state after reconciling.
///
/// Only reported, never raised: reconciliation is re-run on every invocation
/// and the next run corrects it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbiguousState {
    /// Entries without an external ID.
    pub unowned: usize,
    /// Desired external IDs with no remote entry.
    pub missing: Vec<ExternalId>,
    /// Remote external IDs that are not desired.
    pub unexpected: Vec<ExternalId>,
}

impl fmt::Display for AmbiguousState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unowned, {} missing, {} unexpected",
            self.unowned,
            self.missing.len(),
            self.unexpected.len()
        )
    }
}

/// Compares a post-reconciliation read against desired state.
///
/// Returns `None` when the owned entries are exactly the desired keys and no
/// unowned entries remain.
pub fn check_ownership(remote: &[RemoteEntry], desired: &DesiredState) -> Option<AmbiguousState> {
    let mut state = AmbiguousState::default();
    let mut seen = BTreeSet::new();

    for entry in remote {
        match &entry.external_id {
            None => state.unowned += 1,
            Some(external_id) if desired.contains(external_id) => {
                seen.insert(external_id.as_str());
            }
            Some(external_id) => state.unexpected.push(external_id.clone()),
        }
    }
    state.missing = desired
        .keys()
        .filter(|key| !seen.contains(key.as_str()))
        .cloned()
        .collect();

    if state == AmbiguousState::default() {
        None
    } else {
        Some(state)
    }
}
