//! Catalog entry types shared by the engine and the reference server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied key identifying one desired entry across runs.
pub type ExternalId = String;

/// The value bound to one attribute of an entry.
///
/// In JSON a scalar binding is a plain string and an array binding is a list
/// of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeBinding {
    /// A single literal value.
    Value(String),
    /// An ordered list of literal values (array-typed attribute).
    Array(Vec<String>),
}

impl AttributeBinding {
    /// Creates a scalar binding.
    pub fn value(literal: impl Into<String>) -> Self {
        Self::Value(literal.into())
    }

    /// Creates an array binding.
    pub fn array<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(literals.into_iter().map(Into::into).collect())
    }

    /// Returns true for an array binding with no elements.
    pub fn is_empty_array(&self) -> bool {
        matches!(self, Self::Array(values) if values.is_empty())
    }
}

/// An attribute binding as returned by the catalog service.
///
/// `None` means the response carried neither `value` nor `array_value`. The
/// service drops empty arrays from its responses, so this cannot be told
/// apart from an explicitly empty array.
pub type RemoteBinding = Option<AttributeBinding>;

/// Desired specification of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    /// Display name.
    pub name: String,
    /// Alternative names, in the order the caller declared them.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Sort rank. `None` leaves the remote rank alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    /// Attribute bindings keyed by attribute ID.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeBinding>,
}

impl EntrySpec {
    /// Creates a spec with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            rank: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the aliases.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the rank.
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Binds an attribute.
    pub fn with_attribute(
        mut self,
        attribute_id: impl Into<String>,
        binding: AttributeBinding,
    ) -> Self {
        self.attributes.insert(attribute_id.into(), binding);
        self
    }
}

/// The full desired state of a catalog type, keyed by external ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState {
    entries: BTreeMap<ExternalId, EntrySpec>,
}

impl DesiredState {
    /// Creates an empty desired state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an entry, replacing any previous declaration for the key.
    pub fn insert(
        &mut self,
        external_id: impl Into<ExternalId>,
        spec: EntrySpec,
    ) -> Option<EntrySpec> {
        self.entries.insert(external_id.into(), spec)
    }

    /// Builder form of [`DesiredState::insert`].
    pub fn with_entry(mut self, external_id: impl Into<ExternalId>, spec: EntrySpec) -> Self {
        self.insert(external_id, spec);
        self
    }

    /// Looks up the spec declared for an external ID.
    pub fn get(&self, external_id: &str) -> Option<&EntrySpec> {
        self.entries.get(external_id)
    }

    /// Returns true if the external ID is declared.
    pub fn contains(&self, external_id: &str) -> bool {
        self.entries.contains_key(external_id)
    }

    /// Number of declared entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates declared entries in external ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&ExternalId, &EntrySpec)> {
        self.entries.iter()
    }

    /// Iterates declared external IDs in order.
    pub fn keys(&self) -> impl Iterator<Item = &ExternalId> {
        self.entries.keys()
    }
}

impl FromIterator<(ExternalId, EntrySpec)> for DesiredState {
    fn from_iter<T: IntoIterator<Item = (ExternalId, EntrySpec)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A catalog entry as currently stored by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Service-assigned ID. Immutable.
    pub id: String,
    /// External ID, if the entry was created with one.
    pub external_id: Option<ExternalId>,
    /// Display name.
    pub name: String,
    /// Aliases in service order.
    pub aliases: Vec<String>,
    /// Sort rank.
    pub rank: Option<i32>,
    /// Attribute bindings keyed by attribute ID.
    pub attributes: BTreeMap<String, RemoteBinding>,
}

impl RemoteEntry {
    /// Returns true if the entry carries an external ID.
    ///
    /// Entries without one were not created by reconciliation and are never
    /// matched against desired state.
    pub fn is_owned(&self) -> bool {
        self.external_id.is_some()
    }

    /// Returns the external ID, or the service ID for unowned entries.
    pub fn label(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_json_forms() {
        let scalar: AttributeBinding = serde_json::from_str(r#""eu-west""#).unwrap();
        assert_eq!(scalar, AttributeBinding::value("eu-west"));

        let array: AttributeBinding = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(array, AttributeBinding::array(["a", "b"]));
        assert!(!array.is_empty_array());
        assert!(AttributeBinding::Array(vec![]).is_empty_array());
    }

    #[test]
    fn desired_state_from_json() {
        let json = r#"{
            "svc-api": {
                "name": "API",
                "aliases": ["api", "backend"],
                "rank": 3,
                "attributes": { "tier": "1", "owners": ["team-a"] }
            },
            "svc-web": { "name": "Web" }
        }"#;
        let desired: DesiredState = serde_json::from_str(json).unwrap();

        assert_eq!(desired.len(), 2);
        let api = desired.get("svc-api").unwrap();
        assert_eq!(api.aliases, vec!["api", "backend"]);
        assert_eq!(api.rank, Some(3));
        assert_eq!(api.attributes["owners"], AttributeBinding::array(["team-a"]));

        let web = desired.get("svc-web").unwrap();
        assert!(web.aliases.is_empty());
        assert_eq!(web.rank, None);
        assert!(web.attributes.is_empty());
    }

    #[test]
    fn desired_state_insert_replaces() {
        let mut desired = DesiredState::new();
        assert!(desired.insert("ext-1", EntrySpec::new("One")).is_none());
        let previous = desired.insert("ext-1", EntrySpec::new("Uno"));
        assert_eq!(previous.unwrap().name, "One");
        assert_eq!(desired.len(), 1);
        assert!(desired.contains("ext-1"));
    }

    #[test]
    fn remote_entry_ownership() {
        let mut entry = RemoteEntry {
            id: "01ABC".into(),
            external_id: None,
            name: "Orphan".into(),
            aliases: vec![],
            rank: None,
            attributes: BTreeMap::new(),
        };
        assert!(!entry.is_owned());
        assert_eq!(entry.label(), "01ABC");

        entry.external_id = Some("ext-9".into());
        assert!(entry.is_owned());
        assert_eq!(entry.label(), "ext-9");
    }
}
