//! # Catalog Sync Engine
//!
//! Bulk reconciliation of catalog entries against a remote catalog service.
//!
//! This crate provides:
//! - A catalog client abstraction with an HTTP implementation
//! - A paginated remote state reader
//! - A differ producing delete/create/update plans
//! - A two-phase, bounded, fail-fast executor
//! - A model builder projecting remote entries back to the caller's shape
//!
//! ## Architecture
//!
//! One reconciliation run is:
//! 1. Read every entry of the catalog type
//! 2. Diff against the desired state
//! 3. Delete, then create and update
//! 4. Read again and project the owned entries
//!
//! ## Key Invariants
//!
//! - External IDs tie desired entries to remote entries
//! - Entries without an external ID are always deleted
//! - All deletes finish before any create or update starts
//! - Re-running with unchanged desired state performs no writes
//! - No state is kept between runs

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod executor;
mod http;
mod model;
mod plan;
mod reader;
mod reconciler;
mod reqwest_client;

pub use client::{CallKind, CatalogClient, ListPage, MockCall, MockCatalogClient};
pub use config::{CatalogConfig, RetryConfig, DEFAULT_MAX_CONCURRENCY};
pub use error::{Operation, ReconcileError, ReconcileResult};
pub use executor::{execute, ExecutionReport};
pub use http::{
    HttpCatalogClient, HttpClient, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer,
    Method,
};
pub use model::{check_ownership, project, AmbiguousState, CatalogEntriesModel, EntryModel};
pub use plan::{diff, entry_matches, PlanSummary, PlannedCreate, PlannedUpdate, ReconciliationPlan};
pub use reader::list_all;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use reqwest_client::{connect, ReqwestClient};
