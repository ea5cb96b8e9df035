//! JSON messages of the catalog entries HTTP API.

use crate::entry::{AttributeBinding, EntrySpec, RemoteBinding, RemoteEntry};
use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Encodes a message to JSON bytes.
pub fn encode_json<T: Serialize>(what: &'static str, message: &T) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(|source| ProtocolError::Encode { what, source })
}

/// Decodes a message from JSON bytes.
pub fn decode_json<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> ProtocolResult<T> {
    serde_json::from_slice(bytes).map_err(|source| ProtocolError::Decode { what, source })
}

/// A literal attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralValue {
    /// The literal text.
    pub literal: String,
}

impl LiteralValue {
    /// Wraps a literal.
    pub fn new(literal: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
        }
    }
}

/// An attribute binding on the wire.
///
/// At most one of the two fields is set. The service omits `array_value`
/// when the array is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValuePayload {
    /// Scalar value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralValue>,
    /// Array value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_value: Option<Vec<LiteralValue>>,
}

impl AttributeValuePayload {
    /// Returns true if neither field is set.
    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.array_value.is_none()
    }

    /// Converts to a domain binding. Absent payloads become `None`.
    pub fn into_binding(self) -> ProtocolResult<RemoteBinding> {
        match (self.value, self.array_value) {
            (Some(_), Some(_)) => Err(ProtocolError::invalid(
                "attribute value",
                "both value and array_value are set",
            )),
            (Some(value), None) => Ok(Some(AttributeBinding::Value(value.literal))),
            (None, Some(values)) => Ok(Some(AttributeBinding::Array(
                values.into_iter().map(|v| v.literal).collect(),
            ))),
            (None, None) => Ok(None),
        }
    }
}

impl From<&AttributeBinding> for AttributeValuePayload {
    fn from(binding: &AttributeBinding) -> Self {
        match binding {
            AttributeBinding::Value(literal) => Self {
                value: Some(LiteralValue::new(literal.clone())),
                array_value: None,
            },
            AttributeBinding::Array(literals) => Self {
                value: None,
                array_value: Some(literals.iter().cloned().map(LiteralValue::new).collect()),
            },
        }
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntryPayload {
    /// Owning catalog type. Only sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_type_id: Option<String>,
    /// Display name.
    pub name: String,
    /// External ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Rank. Omitted when the caller does not care.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    /// Attribute bindings.
    #[serde(default)]
    pub attribute_values: BTreeMap<String, AttributeValuePayload>,
}

impl CatalogEntryPayload {
    /// Builds the body of a create request.
    pub fn create(catalog_type_id: &str, external_id: &str, spec: &EntrySpec) -> Self {
        let mut payload = Self::update(external_id, spec);
        payload.catalog_type_id = Some(catalog_type_id.to_string());
        payload
    }

    /// Builds the body of an update request.
    pub fn update(external_id: &str, spec: &EntrySpec) -> Self {
        Self {
            catalog_type_id: None,
            name: spec.name.clone(),
            external_id: Some(external_id.to_string()),
            aliases: spec.aliases.clone(),
            rank: spec.rank,
            attribute_values: spec
                .attributes
                .iter()
                .map(|(id, binding)| (id.clone(), AttributeValuePayload::from(binding)))
                .collect(),
        }
    }
}

/// A catalog entry as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntryWire {
    /// Service-assigned ID.
    pub id: String,
    /// Owning catalog type.
    pub catalog_type_id: String,
    /// Display name.
    pub name: String,
    /// External ID, null for entries created without one.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Aliases, possibly null.
    #[serde(default)]
    pub aliases: Option<Vec<String>>,
    /// Rank.
    #[serde(default)]
    pub rank: Option<i32>,
    /// Attribute bindings, possibly null.
    #[serde(default)]
    pub attribute_values: Option<BTreeMap<String, AttributeValuePayload>>,
}

impl CatalogEntryWire {
    /// Converts to a domain entry.
    pub fn into_remote(self) -> ProtocolResult<RemoteEntry> {
        let attributes = self
            .attribute_values
            .unwrap_or_default()
            .into_iter()
            .map(|(id, value)| value.into_binding().map(|binding| (id, binding)))
            .collect::<ProtocolResult<BTreeMap<_, _>>>()?;

        Ok(RemoteEntry {
            id: self.id,
            external_id: self.external_id,
            name: self.name,
            aliases: self.aliases.unwrap_or_default(),
            rank: self.rank,
            attributes,
        })
    }
}

/// Cursor metadata returned with each page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// ID of the last entry in this page, if any.
    #[serde(default)]
    pub after: Option<String>,
    /// Page size the server applied.
    pub page_size: u32,
}

/// Response of the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntriesResponse {
    /// Entries in this page, in ID order.
    pub catalog_entries: Vec<CatalogEntryWire>,
    /// Cursor metadata.
    pub pagination_meta: PaginationMeta,
}

/// Response of the create and update endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEnvelope {
    /// The stored entry.
    pub catalog_entry: CatalogEntryWire,
}

/// A single error reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: String,
    /// HTTP status.
    pub status: u16,
    /// Individual errors.
    pub errors: Vec<ApiError>,
}

impl ErrorResponse {
    /// Creates an error response with a single error.
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = match status {
            401 => "authentication_error",
            404 => "not_found",
            422 => "validation_error",
            429 => "rate_limited",
            400..=499 => "invalid_request_error",
            _ => "internal_error",
        };
        Self {
            kind: kind.to_string(),
            status,
            errors: vec![ApiError {
                code: code.into(),
                message: message.into(),
            }],
        }
    }

    /// Joins the error messages into one line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
