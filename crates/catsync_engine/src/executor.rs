//! Executor: applies a plan in two bounded, fail-fast phases.
//!
//! Deletes run first and must all finish before any create or update is
//! dispatched. Within a phase up to `max_concurrency` workers pull work from a
//! shared index. The first failure raises a cancellation flag: calls already
//! in flight finish, nothing new is dispatched, and the failure is returned
//! wrapped in [`ReconcileError::Aborted`]. Nothing is rolled back.

use crate::client::CatalogClient;
use crate::error::{Operation, ReconcileError, ReconcileResult};
use crate::plan::{PlannedCreate, PlannedUpdate, ReconciliationPlan};
use catsync_protocol::RemoteEntry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info};

/// Counts of mutations applied by [`execute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Entries deleted.
    pub deleted: usize,
    /// Entries created.
    pub created: usize,
    /// Entries updated.
    pub updated: usize,
}

impl ExecutionReport {
    /// Total number of writes.
    pub fn total(&self) -> usize {
        self.deleted + self.created + self.updated
    }
}

enum Task<'a> {
    Delete(&'a RemoteEntry),
    Create(&'a PlannedCreate),
    Update(&'a PlannedUpdate),
}

impl Task<'_> {
    fn operation(&self) -> Operation {
        match self {
            Task::Delete(_) => Operation::Delete,
            Task::Create(_) => Operation::Create,
            Task::Update(_) => Operation::Update,
        }
    }

    fn label(&self) -> &str {
        match self {
            Task::Delete(entry) => entry.label(),
            Task::Create(create) => &create.external_id,
            Task::Update(update) => &update.external_id,
        }
    }

    fn run<C: CatalogClient + ?Sized>(
        &self,
        client: &C,
        catalog_type_id: &str,
    ) -> ReconcileResult<()> {
        match self {
            Task::Delete(entry) => {
                client.delete(&entry.id)?;
                debug!(entry_id = %entry.id, entry = entry.label(), "deleted catalog entry");
            }
            Task::Create(create) => {
                let created = client.create(catalog_type_id, &create.external_id, &create.spec)?;
                debug!(
                    entry_id = %created.id,
                    external_id = %create.external_id,
                    "created catalog entry"
                );
            }
            Task::Update(update) => {
                client.update(&update.entry_id, &update.external_id, &update.spec)?;
                debug!(
                    entry_id = %update.entry_id,
                    external_id = %update.external_id,
                    "updated catalog entry"
                );
            }
        }
        Ok(())
    }
}

/// Applies a plan against the catalog.
///
/// A failure in the deletion phase means the create/update phase never runs.
pub fn execute<C: CatalogClient + ?Sized>(
    client: &C,
    catalog_type_id: &str,
    plan: &ReconciliationPlan,
    max_concurrency: usize,
) -> ReconcileResult<ExecutionReport> {
    let deletes: Vec<Task<'_>> = plan.to_delete.iter().map(Task::Delete).collect();
    if !deletes.is_empty() {
        info!(catalog_type_id, count = deletes.len(), "deleting catalog entries");
        run_phase(client, catalog_type_id, &deletes, max_concurrency)?;
    }

    let writes: Vec<Task<'_>> = plan
        .to_create
        .iter()
        .map(Task::Create)
        .chain(plan.to_update.iter().map(Task::Update))
        .collect();
    if !writes.is_empty() {
        info!(
            catalog_type_id,
            creates = plan.to_create.len(),
            updates = plan.to_update.len(),
            "writing catalog entries"
        );
        run_phase(client, catalog_type_id, &writes, max_concurrency)?;
    }

    Ok(ExecutionReport {
        deleted: plan.to_delete.len(),
        created: plan.to_create.len(),
        updated: plan.to_update.len(),
    })
}

fn run_phase<C: CatalogClient + ?Sized>(
    client: &C,
    catalog_type_id: &str,
    tasks: &[Task<'_>],
    max_concurrency: usize,
) -> ReconcileResult<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let workers = max_concurrency.clamp(1, tasks.len());
    let next = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let first_error: Mutex<Option<ReconcileError>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                // Checked after claiming, so a failure recorded in between
                // still stops this task.
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let Some(task) = tasks.get(index) else {
                    break;
                };
                if let Err(err) = task.run(client, catalog_type_id) {
                    cancelled.store(true, Ordering::SeqCst);
                    let mut slot = first_error.lock();
                    if slot.is_none() {
                        *slot =
                            Some(ReconcileError::aborted(task.operation(), task.label(), err));
                    }
                    break;
                }
            });
        }
    });

    match first_error.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
