//! # Catalog Sync Server
//!
//! In-memory reference implementation of the catalog entries HTTP API.
//!
//! This crate provides:
//! - Routing for list, create, show, update and delete
//! - An in-memory entry store keyed by generated IDs
//! - Bearer API key authentication
//! - Service-compatible JSON error bodies
//!
//! # Architecture
//!
//! The server is transport-agnostic: [`CatalogServer::handle`] takes a method,
//! a request target and a body and returns a status and a body. Tests plug it
//! into the engine's loopback HTTP client, so the engine's real HTTP code path
//! runs without a socket.
//!
//! Like the real service, responses omit empty array values by default, so
//! an attribute bound to `[]` comes back with neither `value` nor
//! `array_value`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::ApiKeyValidator;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, ListQuery, RequestHandler};
pub use server::CatalogServer;
pub use store::{CatalogStore, EntryFields, StoredEntry};
