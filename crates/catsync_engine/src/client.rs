//! Remote catalog client abstraction.

use crate::error::{Operation, ReconcileError, ReconcileResult};
use catsync_protocol::{AttributeBinding, EntrySpec, RemoteEntry};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One page of a list call.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Entries in this page, in service order.
    pub entries: Vec<RemoteEntry>,
    /// Cursor reported by the service for the next page.
    pub next_cursor: Option<String>,
}

/// A client of the catalog entries API.
///
/// Every call is blocking and one-shot. Non-2xx responses surface as
/// [`ReconcileError::Remote`] carrying the raw body. Implementations are shared
/// across executor workers, so they must be `Send + Sync`.
pub trait CatalogClient: Send + Sync {
    /// Lists one page of entries of a catalog type, starting after `after`.
    fn list(
        &self,
        catalog_type_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> ReconcileResult<ListPage>;

    /// Creates an entry.
    fn create(
        &self,
        catalog_type_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry>;

    /// Replaces an existing entry.
    fn update(
        &self,
        entry_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry>;

    /// Deletes an entry.
    fn delete(&self, entry_id: &str) -> ReconcileResult<()>;
}

/// Kind of call recorded by [`MockCatalogClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// A list call.
    List,
    /// A create call.
    Create,
    /// An update call.
    Update,
    /// A delete call.
    Delete,
}

impl From<Operation> for CallKind {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Delete => CallKind::Delete,
            Operation::Create => CallKind::Create,
            Operation::Update => CallKind::Update,
        }
    }
}

/// A call recorded by [`MockCatalogClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Call kind.
    pub kind: CallKind,
    /// Catalog type for lists and creates, entry ID for updates and deletes.
    pub target: String,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: CallKind,
    target: Option<String>,
    status: u16,
}

#[derive(Debug, Default)]
struct MockStore {
    entries: BTreeMap<String, (String, RemoteEntry)>,
    next_id: u64,
}

impl MockStore {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("entry-{:06}", self.next_id)
    }
}

/// An in-memory catalog client for testing.
///
/// Behaves like the catalog service: IDs are assigned in ascending order, list
/// pages are cursor-based, and empty arrays are dropped from stored bindings.
/// Faults can be injected per call kind and target.
#[derive(Debug, Default)]
pub struct MockCatalogClient {
    store: Mutex<MockStore>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<MockCall>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCatalogClient {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry directly, bypassing the call log.
    ///
    /// Pass `None` as external ID to simulate an entry created through
    /// another channel. Returns the assigned ID.
    pub fn seed(
        &self,
        catalog_type_id: &str,
        external_id: Option<&str>,
        spec: &EntrySpec,
    ) -> String {
        let mut store = self.store.lock();
        let id = store.allocate_id();
        let entry = stored_entry(id.clone(), external_id.map(str::to_string), spec);
        store
            .entries
            .insert(id.clone(), (catalog_type_id.to_string(), entry));
        id
    }

    /// Stores a fully specified remote entry, bypassing the call log.
    pub fn seed_raw(&self, catalog_type_id: &str, entry: RemoteEntry) {
        self.store
            .lock()
            .entries
            .insert(entry.id.clone(), (catalog_type_id.to_string(), entry));
    }

    /// Returns all stored entries of a catalog type in ID order.
    pub fn entries(&self, catalog_type_id: &str) -> Vec<RemoteEntry> {
        self.store
            .lock()
            .entries
            .values()
            .filter(|(ct, _)| ct == catalog_type_id)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Makes every call of `kind` fail with `status`.
    pub fn fail_all(&self, kind: CallKind, status: u16) {
        self.faults.lock().push(Fault {
            kind,
            target: None,
            status,
        });
    }

    /// Makes calls of `kind` touching `target` fail with `status`.
    ///
    /// `target` matches an entry ID or an external ID.
    pub fn fail_on(&self, kind: CallKind, target: impl Into<String>, status: u16) {
        self.faults.lock().push(Fault {
            kind,
            target: Some(target.into()),
            status,
        });
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Adds a fixed delay to every mutation call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Returns every recorded call in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Counts recorded calls of one kind.
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind == kind).count()
    }

    /// Counts recorded create, update and delete calls.
    pub fn write_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind != CallKind::List)
            .count()
    }

    /// Clears the call log and in-flight statistics.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
        self.max_in_flight.store(0, Ordering::SeqCst);
    }

    /// Highest number of mutation calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, kind: CallKind, target: &str) {
        self.calls.lock().push(MockCall {
            kind,
            target: target.to_string(),
        });
    }

    fn check_fault(&self, kind: CallKind, targets: &[&str]) -> ReconcileResult<()> {
        let faults = self.faults.lock();
        let hit = faults.iter().find(|f| {
            f.kind == kind
                && f.target
                    .as_deref()
                    .map_or(true, |t| targets.contains(&t))
        });
        match hit {
            Some(fault) => Err(ReconcileError::remote(
                fault.status,
                format!(r#"{{"type":"injected","status":{}}}"#, fault.status),
            )),
            None => Ok(()),
        }
    }

    fn mutate<T>(&self, f: impl FnOnce() -> ReconcileResult<T>) -> ReconcileResult<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        let result = f();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn external_id_of(&self, entry_id: &str) -> Option<String> {
        self.store
            .lock()
            .entries
            .get(entry_id)
            .and_then(|(_, e)| e.external_id.clone())
    }
}

impl CatalogClient for MockCatalogClient {
    fn list(
        &self,
        catalog_type_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> ReconcileResult<ListPage> {
        self.record(CallKind::List, catalog_type_id);
        self.check_fault(CallKind::List, &[catalog_type_id])?;

        let store = self.store.lock();
        let entries: Vec<RemoteEntry> = store
            .entries
            .iter()
            .filter(|(id, (ct, _))| {
                ct == catalog_type_id && after.map_or(true, |a| id.as_str() > a)
            })
            .take(page_size as usize)
            .map(|(_, (_, entry))| entry.clone())
            .collect();
        let next_cursor = entries.last().map(|e| e.id.clone());

        Ok(ListPage {
            entries,
            next_cursor,
        })
    }

    fn create(
        &self,
        catalog_type_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry> {
        self.record(CallKind::Create, catalog_type_id);
        self.mutate(|| {
            self.check_fault(CallKind::Create, &[external_id])?;
            let mut store = self.store.lock();
            let id = store.allocate_id();
            let entry = stored_entry(id.clone(), Some(external_id.to_string()), spec);
            store
                .entries
                .insert(id, (catalog_type_id.to_string(), entry.clone()));
            Ok(entry)
        })
    }

    fn update(
        &self,
        entry_id: &str,
        external_id: &str,
        spec: &EntrySpec,
    ) -> ReconcileResult<RemoteEntry> {
        self.record(CallKind::Update, entry_id);
        self.mutate(|| {
            self.check_fault(CallKind::Update, &[entry_id, external_id])?;
            let mut store = self.store.lock();
            let (_, slot) = store
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ReconcileError::remote(404, r#"{"type":"not_found"}"#))?;
            let mut entry =
                stored_entry(entry_id.to_string(), Some(external_id.to_string()), spec);
            if spec.rank.is_none() {
                entry.rank = slot.rank;
            }
            *slot = entry.clone();
            Ok(entry)
        })
    }

    fn delete(&self, entry_id: &str) -> ReconcileResult<()> {
        self.record(CallKind::Delete, entry_id);
        let external_id = self.external_id_of(entry_id);
        self.mutate(|| {
            let mut targets = vec![entry_id];
            if let Some(ext) = external_id.as_deref() {
                targets.push(ext);
            }
            self.check_fault(CallKind::Delete, &targets)?;
            self.store
                .lock()
                .entries
                .remove(entry_id)
                .map(|_| ())
                .ok_or_else(|| ReconcileError::remote(404, r#"{"type":"not_found"}"#))
        })
    }
}

/// Builds an entry the way the service stores it: empty arrays come back
/// with neither `value` nor `array_value` and an unset rank defaults to 0.
fn stored_entry(id: String, external_id: Option<String>, spec: &EntrySpec) -> RemoteEntry {
    RemoteEntry {
        id,
        external_id,
        name: spec.name.clone(),
        aliases: spec.aliases.clone(),
        rank: Some(spec.rank.unwrap_or(0)),
        attributes: spec
            .attributes
            .iter()
            .map(|(attr, binding)| {
                let binding = match binding {
                    AttributeBinding::Array(values) if values.is_empty() => None,
                    other => Some(other.clone()),
                };
                (attr.clone(), binding)
            })
            .collect(),
    }
}
