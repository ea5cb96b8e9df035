//! Integration tests for the reconciliation engine and the reference server.

use catsync_engine::{
    diff, execute, CatalogConfig, ExecutionReport, Operation, ReconcileError, ReconciliationPlan,
    DEFAULT_MAX_CONCURRENCY,
};
use catsync_protocol::{AttributeBinding, DesiredState, EntrySpec, RemoteEntry};
use catsync_server::ServerConfig;
use catsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn empty_array_desired() -> DesiredState {
    DesiredState::new().with_entry(
        "svc-api",
        EntrySpec::new("API")
            .with_aliases(["api", "backend"])
            .with_attribute("owners", AttributeBinding::Array(vec![]))
            .with_attribute("tier", AttributeBinding::value("1")),
    )
}

#[test]
fn concrete_scenario_plan() {
    let catalog = TestCatalog::new();
    seed_scenario(&catalog);

    let plan = catalog
        .reconciler
        .plan(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap();

    assert_eq!(plan.to_delete.len(), 1);
    assert_eq!(plan.to_delete[0].external_id.as_deref(), Some("ext-3"));
    assert_eq!(plan.to_create.len(), 1);
    assert_eq!(plan.to_create[0].external_id, "ext-2");
    assert!(plan.to_update.is_empty());
}

#[test]
fn update_detection() {
    let catalog = TestCatalog::new();
    let id = catalog.seed(Some("ext-1"), &EntrySpec::new("One"));
    let desired = DesiredState::new().with_entry("ext-1", EntrySpec::new("Uno"));

    let plan = catalog.reconciler.plan(TEST_CATALOG_TYPE, &desired).unwrap();
    assert_eq!(plan.to_update.len(), 1);
    assert_eq!(plan.to_update[0].entry_id, id);
    assert_eq!(plan.to_update[0].spec.name, "Uno");

    catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &desired)
        .unwrap();
    let entries = catalog.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);
    assert_eq!(entries[0].name, "Uno");
}

#[test]
fn reconcile_converges_then_reads_only() {
    let catalog = TestCatalog::new();
    seed_scenario(&catalog);
    catalog.seed(None, &EntrySpec::new("Created by hand"));

    let outcome = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap();

    assert_eq!(outcome.report.deleted, 2);
    assert_eq!(outcome.report.created, 1);
    assert_eq!(outcome.report.updated, 0);
    assert_eq!(
        catalog.owned_external_ids(),
        BTreeSet::from(["ext-1".to_string(), "ext-2".to_string()])
    );
    assert_eq!(catalog.unowned_count(), 0);

    // Two list requests (one page, one empty page) and nothing else.
    let before = catalog.server.request_count();
    let again = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap();
    assert_eq!(catalog.server.request_count() - before, 2);
    assert_eq!(again.report.total(), 0);
    assert_eq!(again.model, outcome.model);
}

#[test]
fn dropped_empty_arrays_are_masked() {
    let catalog = TestCatalog::new();
    let desired = empty_array_desired();

    let outcome = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &desired)
        .unwrap();
    let api = outcome.model.get("svc-api").unwrap();
    assert_eq!(api.attributes["owners"], AttributeBinding::Array(vec![]));
    assert_eq!(api.attributes["tier"], AttributeBinding::value("1"));

    // The server keeps the empty array; only the response drops it.
    let stored = &catalog.entries()[0];
    assert_eq!(
        stored.attributes["owners"],
        Some(AttributeBinding::Array(vec![]))
    );
    let unmasked = catalog.reconciler.read(TEST_CATALOG_TYPE, None).unwrap();
    assert!(!unmasked
        .get("svc-api")
        .unwrap()
        .attributes
        .contains_key("owners"));

    let again = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &desired)
        .unwrap();
    assert_eq!(again.report.total(), 0);
}

#[test]
fn empty_arrays_round_trip_when_service_keeps_them() {
    let catalog = TestCatalog::with_configs(
        test_server_config().with_drop_empty_arrays(false),
        test_catalog_config(),
    );
    let desired = empty_array_desired();

    catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &desired)
        .unwrap();
    let model = catalog.reconciler.read(TEST_CATALOG_TYPE, None).unwrap();
    assert_eq!(
        model.get("svc-api").unwrap().attributes["owners"],
        AttributeBinding::Array(vec![])
    );
    assert!(catalog
        .reconciler
        .plan(TEST_CATALOG_TYPE, &desired)
        .unwrap()
        .is_empty());
}

#[test]
fn destroy_pages_through_everything() {
    let catalog = TestCatalog::with_configs(
        test_server_config(),
        test_catalog_config().with_page_size(3),
    );
    for i in 0..10 {
        let external_id = format!("ext-{i}");
        let external_id = (i % 2 == 0).then_some(external_id.as_str());
        catalog.seed(external_id, &EntrySpec::new(format!("Entry {i}")));
    }

    let report = catalog.reconciler.destroy(TEST_CATALOG_TYPE).unwrap();
    assert_eq!(report.deleted, 10);
    assert!(catalog.entries().is_empty());
}

#[test]
fn transient_statuses_are_retried_by_transport() {
    let catalog = TestCatalog::new();
    seed_scenario(&catalog);
    catalog.server.inject_failures([429, 503]);

    let outcome = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap();
    assert_eq!(outcome.model.len(), 2);
}

#[test]
fn persistent_list_failure_is_a_remote_error() {
    let catalog = TestCatalog::new();
    catalog.server.inject_failures([500, 500, 500]);

    let err = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap_err();
    match err {
        ReconcileError::Remote { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("injected"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(catalog.server.request_count(), 3);
}

#[test]
fn wrong_api_key_is_not_retried() {
    let catalog = TestCatalog::with_configs(
        ServerConfig::default().with_api_key("another-key"),
        test_catalog_config(),
    );

    let err = catalog.reconciler.read(TEST_CATALOG_TYPE, None).unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(catalog.server.request_count(), 1);
}

#[test]
fn rejected_create_aborts_with_context() {
    let catalog = TestCatalog::new();
    let desired = DesiredState::new().with_entry("ext-blank", EntrySpec::new("   "));

    let err = catalog
        .reconciler
        .reconcile(TEST_CATALOG_TYPE, &desired)
        .unwrap_err();
    match &err {
        ReconcileError::Aborted {
            operation, entry, ..
        } => {
            assert_eq!(*operation, Operation::Create);
            assert_eq!(entry, "ext-blank");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status(), Some(422));
    assert!(catalog.entries().is_empty());
}

#[test]
fn failed_delete_phase_never_writes() {
    let catalog = TestCatalog::with_configs(
        test_server_config(),
        test_catalog_config().with_max_concurrency(1),
    );
    catalog.seed(None, &EntrySpec::new("Drift"));
    let missing = catalog.seed(Some("ext-gone"), &EntrySpec::new("Gone"));
    let plan = catalog
        .reconciler
        .plan(TEST_CATALOG_TYPE, &scenario_desired())
        .unwrap();
    assert_eq!(plan.to_delete.len(), 2);

    // Delete one entry behind the engine's back so its delete gets a 404.
    catalog.server.store().delete(&missing).unwrap();
    let err = execute_plan(&catalog, &plan).unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(catalog.owned_external_ids(), BTreeSet::new());
    assert!(catalog
        .entries()
        .iter()
        .all(|e| e.name != "One" && e.name != "Two"));
}

fn execute_plan(
    catalog: &TestCatalog,
    plan: &ReconciliationPlan,
) -> Result<ExecutionReport, ReconcileError> {
    execute(
        catalog.reconciler.client(),
        TEST_CATALOG_TYPE,
        plan,
        catalog.reconciler.config().max_concurrency,
    )
}

#[test]
fn default_concurrency() {
    assert_eq!(
        CatalogConfig::default().max_concurrency,
        DEFAULT_MAX_CONCURRENCY
    );
}

fn remote_from_seed(seed: &RemoteSeed) -> Vec<RemoteEntry> {
    let owned = seed.owned.iter().map(|(id, spec)| (Some(id.clone()), spec));
    let unowned = seed.unowned.iter().map(|spec| (None, spec));
    owned
        .chain(unowned)
        .enumerate()
        .map(|(i, (external_id, spec))| RemoteEntry {
            id: format!("r{i:04}"),
            external_id,
            name: spec.name.clone(),
            aliases: spec.aliases.clone(),
            rank: Some(spec.rank.unwrap_or(0)),
            attributes: spec
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn unowned_entries_are_always_deleted(
        seed in remote_seed_strategy(5, 4),
        desired in desired_state_strategy(5),
    ) {
        let plan = diff(&desired, remote_from_seed(&seed));
        let deleted_unowned = plan.to_delete.iter().filter(|e| !e.is_owned()).count();
        prop_assert_eq!(deleted_unowned, seed.unowned.len());

        let touched: BTreeSet<&str> = plan
            .to_create
            .iter()
            .map(|c| c.external_id.as_str())
            .chain(plan.to_update.iter().map(|u| u.external_id.as_str()))
            .collect();
        prop_assert!(touched.iter().all(|id| desired.contains(id)));
        prop_assert!(plan
            .to_delete
            .iter()
            .all(|e| e.external_id.as_deref().map_or(true, |id| !desired.contains(id))));
    }

    #[test]
    fn reconcile_is_idempotent_and_owns_exactly_desired(
        (seed, desired) in remote_seed_strategy(5, 3)
            .prop_flat_map(|seed| (Just(seed.clone()), overlapping_desired_strategy(seed, 4)))
    ) {
        let catalog = TestCatalog::new();
        catalog.seed_remote(&seed);

        let outcome = catalog.reconciler.reconcile(TEST_CATALOG_TYPE, &desired).unwrap();

        let expected: BTreeSet<String> = desired.keys().cloned().collect();
        prop_assert_eq!(catalog.owned_external_ids(), expected);
        prop_assert_eq!(catalog.unowned_count(), 0);
        prop_assert!(catalog.reconciler.plan(TEST_CATALOG_TYPE, &desired).unwrap().is_empty());

        prop_assert_eq!(outcome.model.len(), desired.len());
        for (external_id, spec) in desired.iter() {
            let mut projected = outcome.model.get(external_id).unwrap().to_spec();
            if spec.rank.is_none() {
                projected.rank = None;
            }
            prop_assert_eq!(&projected, spec);
        }
    }
}
