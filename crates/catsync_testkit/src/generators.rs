//! Property-based test generators using proptest.
//!
//! Provides strategies for generating desired states and remote catalogs
//! that satisfy the service's constraints (non-blank names, unique external
//! IDs per catalog type).

use catsync_protocol::{AttributeBinding, DesiredState, EntrySpec, ExternalId};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating external IDs.
pub fn external_id_strategy() -> impl Strategy<Value = ExternalId> {
    prop::string::string_regex("ext-[a-z0-9]{1,6}").expect("Invalid regex")
}

/// Strategy for generating entry names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{0,10}").expect("Invalid regex")
}

/// Strategy for generating ordered alias lists.
pub fn aliases_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex"),
        0..4,
    )
}

/// Strategy for generating attribute bindings, empty arrays included.
pub fn binding_strategy() -> impl Strategy<Value = AttributeBinding> {
    prop_oneof![
        prop::string::string_regex("[a-z0-9]{1,8}")
            .expect("Invalid regex")
            .prop_map(AttributeBinding::Value),
        prop::collection::vec(
            prop::string::string_regex("[a-z]{1,5}").expect("Invalid regex"),
            0..3,
        )
        .prop_map(AttributeBinding::Array),
    ]
}

/// Strategy for generating entry specs.
pub fn entry_spec_strategy() -> impl Strategy<Value = EntrySpec> {
    (
        name_strategy(),
        aliases_strategy(),
        prop::option::of(-5i32..100),
        prop::collection::btree_map(
            prop::string::string_regex("attr-[a-d]").expect("Invalid regex"),
            binding_strategy(),
            0..3,
        ),
    )
        .prop_map(|(name, aliases, rank, attributes)| EntrySpec {
            name,
            aliases,
            rank,
            attributes,
        })
}

/// Strategy for generating a desired state with up to `max_entries` entries.
pub fn desired_state_strategy(max_entries: usize) -> impl Strategy<Value = DesiredState> {
    prop::collection::btree_map(external_id_strategy(), entry_spec_strategy(), 0..=max_entries)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Initial contents of a remote catalog type.
#[derive(Debug, Clone, Default)]
pub struct RemoteSeed {
    /// Entries created with an external ID.
    pub owned: BTreeMap<ExternalId, EntrySpec>,
    /// Entries created without one.
    pub unowned: Vec<EntrySpec>,
}

impl RemoteSeed {
    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.owned.len() + self.unowned.len()
    }

    /// Returns true if nothing is seeded.
    pub fn is_empty(&self) -> bool {
        self.owned.is_empty() && self.unowned.is_empty()
    }
}

/// Strategy for generating remote catalog contents.
pub fn remote_seed_strategy(
    max_owned: usize,
    max_unowned: usize,
) -> impl Strategy<Value = RemoteSeed> {
    (
        prop::collection::btree_map(external_id_strategy(), entry_spec_strategy(), 0..=max_owned),
        prop::collection::vec(entry_spec_strategy(), 0..=max_unowned),
    )
        .prop_map(|(owned, unowned)| RemoteSeed { owned, unowned })
}

/// Strategy for a desired state derived from a seed, so that some external
/// IDs overlap with the remote side.
pub fn overlapping_desired_strategy(
    seed: RemoteSeed,
    max_new: usize,
) -> impl Strategy<Value = DesiredState> {
    let keys: Vec<ExternalId> = seed.owned.keys().cloned().collect();
    let kept = prop::sample::subsequence(keys.clone(), 0..=keys.len());
    (
        kept,
        prop::collection::vec(entry_spec_strategy(), keys.len()),
        desired_state_strategy(max_new),
        any::<bool>(),
    )
        .prop_map(move |(kept, specs, extra, reuse_specs)| {
            let mut desired = extra;
            for (external_id, spec) in kept.into_iter().zip(specs) {
                let spec = match (reuse_specs, seed.owned.get(&external_id)) {
                    (true, Some(existing)) => existing.clone(),
                    _ => spec,
                };
                desired.insert(external_id, spec);
            }
            desired
        })
}
