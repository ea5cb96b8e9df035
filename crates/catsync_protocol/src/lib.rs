//! # Catalog Sync Protocol
//!
//! Catalog entry types and JSON wire messages for catalog sync.
//!
//! This crate provides:
//! - `EntrySpec` and `DesiredState` for the caller's declared entries
//! - `RemoteEntry` for entries as stored by the catalog service
//! - Request/response messages of the catalog entries HTTP API
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod messages;

pub use entry::{AttributeBinding, DesiredState, EntrySpec, ExternalId, RemoteBinding, RemoteEntry};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    decode_json, encode_json, ApiError, AttributeValuePayload, CatalogEntryPayload,
    CatalogEntryWire, EntryEnvelope, ErrorResponse, ListEntriesResponse, LiteralValue,
    PaginationMeta,
};

/// Largest page size accepted by the catalog entries list endpoint.
pub const MAX_PAGE_SIZE: u32 = 250;
