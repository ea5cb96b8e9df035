//! Differ: computes the mutations that make remote state match desired state.

use catsync_protocol::{AttributeBinding, DesiredState, EntrySpec, ExternalId, RemoteEntry};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// An entry to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    /// External ID of the new entry.
    pub external_id: ExternalId,
    /// Desired spec.
    pub spec: EntrySpec,
}

/// An existing entry to overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// Service ID of the existing entry.
    pub entry_id: String,
    /// External ID shared by both sides.
    pub external_id: ExternalId,
    /// Desired spec.
    pub spec: EntrySpec,
}

/// The mutations of one reconciliation run.
///
/// Built fresh on every run and discarded after execution. The three sets are
/// disjoint: an entry is deleted, created, updated or left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Remote entries to delete.
    pub to_delete: Vec<RemoteEntry>,
    /// Entries to create.
    pub to_create: Vec<PlannedCreate>,
    /// Entries to update.
    pub to_update: Vec<PlannedUpdate>,
    /// Desired entries already matching their remote counterpart.
    pub unchanged: usize,
}

impl ReconciliationPlan {
    /// Returns true if the plan performs no writes.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty() && self.to_update.is_empty()
    }

    /// Number of writes the plan performs.
    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_create.len() + self.to_update.len()
    }

    /// Counts per mutation kind.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            deletes: self.to_delete.len(),
            creates: self.to_create.len(),
            updates: self.to_update.len(),
            unchanged: self.unchanged,
        }
    }
}

/// Counts of a [`ReconciliationPlan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Entries to delete.
    pub deletes: usize,
    /// Entries to create.
    pub creates: usize,
    /// Entries to update.
    pub updates: usize,
    /// Entries left alone.
    pub unchanged: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to delete, {} to create, {} to update, {} unchanged",
            self.deletes, self.creates, self.updates, self.unchanged
        )
    }
}

/// Diffs desired state against the full remote collection.
///
/// Remote entries are partitioned first: unowned entries, entries whose
/// external ID is not desired, and later duplicates of an external ID are
/// deleted. Every desired entry is then created, updated or left alone
/// depending on its match in the retained set.
pub fn diff(desired: &DesiredState, remote: Vec<RemoteEntry>) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    let mut existing: HashMap<ExternalId, RemoteEntry> = HashMap::new();

    for entry in remote {
        let Some(external_id) = entry.external_id.clone() else {
            plan.to_delete.push(entry);
            continue;
        };
        if !desired.contains(&external_id) {
            plan.to_delete.push(entry);
            continue;
        }
        match existing.entry(external_id) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            // The service keeps external IDs unique; if it ever doesn't, keep
            // the first and drop the rest so ownership stays 1:1.
            Entry::Occupied(_) => plan.to_delete.push(entry),
        }
    }

    for (external_id, spec) in desired.iter() {
        match existing.get(external_id) {
            None => plan.to_create.push(PlannedCreate {
                external_id: external_id.clone(),
                spec: spec.clone(),
            }),
            Some(current) if entry_matches(current, spec) => plan.unchanged += 1,
            Some(current) => plan.to_update.push(PlannedUpdate {
                entry_id: current.id.clone(),
                external_id: external_id.clone(),
                spec: spec.clone(),
            }),
        }
    }

    plan
}

/// Returns true if a remote entry already satisfies a spec.
///
/// Aliases are compared in order. An unset desired rank matches any remote
/// rank. Attribute maps must match key for key once empty bindings are
/// dropped from both sides.
pub fn entry_matches(remote: &RemoteEntry, spec: &EntrySpec) -> bool {
    remote.name == spec.name
        && remote.aliases == spec.aliases
        && spec.rank.map_or(true, |rank| remote.rank == Some(rank))
        && attributes_match(remote, spec)
}

/// The service drops empty arrays from responses, so a desired empty array
/// and a remote binding with no value both mean "nothing bound".
fn attributes_match(remote: &RemoteEntry, spec: &EntrySpec) -> bool {
    let desired: BTreeMap<&String, &AttributeBinding> = spec
        .attributes
        .iter()
        .filter(|(_, binding)| !binding.is_empty_array())
        .collect();
    let current: BTreeMap<&String, &AttributeBinding> = remote
        .attributes
        .iter()
        .filter_map(|(id, binding)| binding.as_ref().map(|b| (id, b)))
        .filter(|(_, binding)| !binding.is_empty_array())
        .collect();
    desired == current
}
