//! Reconciliation entry point.

use crate::client::CatalogClient;
use crate::config::CatalogConfig;
use crate::error::ReconcileResult;
use crate::executor::{execute, ExecutionReport};
use crate::http::HttpCatalogClient;
use crate::model::{check_ownership, project, CatalogEntriesModel};
use crate::plan::{diff, PlanSummary, ReconciliationPlan};
use crate::reader::list_all;
use crate::reqwest_client::{connect, ReqwestClient};
use catsync_protocol::{DesiredState, RemoteEntry};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Owned entries as read back after execution.
    pub model: CatalogEntriesModel,
    /// What the plan contained.
    pub summary: PlanSummary,
    /// What was applied.
    pub report: ExecutionReport,
    /// Wall-clock time of the whole run.
    pub duration: Duration,
}

/// Reconciles catalog types against desired state.
///
/// Each call reads the remote collection from scratch; nothing is cached
/// between calls. Runs are idempotent, so a failed run is recovered by
/// running again.
pub struct Reconciler<C: CatalogClient> {
    config: CatalogConfig,
    client: C,
}

impl Reconciler<HttpCatalogClient<ReqwestClient>> {
    /// Creates a reconciler talking HTTPS to `config.base_url`.
    pub fn connect(config: CatalogConfig) -> ReconcileResult<Self> {
        let client = connect(config.clone())?;
        Self::new(config, client)
    }
}

impl<C: CatalogClient> Reconciler<C> {
    /// Creates a new reconciler.
    pub fn new(config: CatalogConfig, client: C) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Gets the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Makes the entries of a catalog type match `desired`.
    ///
    /// Entries without an external ID, or whose external ID is not desired,
    /// are deleted. On failure, mutations applied before the failing one are
    /// kept.
    pub fn reconcile(
        &self,
        catalog_type_id: &str,
        desired: &DesiredState,
    ) -> ReconcileResult<ReconcileOutcome> {
        let start = Instant::now();
        info!(
            catalog_type_id,
            desired = desired.len(),
            "reconciling catalog entries"
        );

        let remote = self.list(catalog_type_id)?;
        let plan = diff(desired, remote.clone());
        let summary = plan.summary();
        info!(catalog_type_id, plan = %summary, "computed reconciliation plan");

        let (report, remote) = if plan.is_empty() {
            (ExecutionReport::default(), remote)
        } else {
            let report = execute(
                &self.client,
                catalog_type_id,
                &plan,
                self.config.max_concurrency,
            )?;
            (report, self.list(catalog_type_id)?)
        };

        if let Some(state) = check_ownership(&remote, desired) {
            warn!(
                catalog_type_id,
                unowned = state.unowned,
                missing = state.missing.len(),
                unexpected = state.unexpected.len(),
                "catalog entries still differ from desired state after reconciling"
            );
        }

        let model = project(catalog_type_id, remote, Some(desired));
        let duration = start.elapsed();
        info!(
            catalog_type_id,
            deleted = report.deleted,
            created = report.created,
            updated = report.updated,
            duration_ms = duration.as_millis() as u64,
            "reconciled catalog entries"
        );

        Ok(ReconcileOutcome {
            model,
            summary,
            report,
            duration,
        })
    }

    /// Computes the plan `reconcile` would apply, without writing anything.
    pub fn plan(
        &self,
        catalog_type_id: &str,
        desired: &DesiredState,
    ) -> ReconcileResult<ReconciliationPlan> {
        Ok(diff(desired, self.list(catalog_type_id)?))
    }

    /// Reads the owned entries of a catalog type.
    ///
    /// `prior` is the caller's last declared state, used to fill in attribute
    /// values the service omits.
    pub fn read(
        &self,
        catalog_type_id: &str,
        prior: Option<&DesiredState>,
    ) -> ReconcileResult<CatalogEntriesModel> {
        Ok(project(catalog_type_id, self.list(catalog_type_id)?, prior))
    }

    /// Deletes every entry of a catalog type, owned or not.
    pub fn destroy(&self, catalog_type_id: &str) -> ReconcileResult<ExecutionReport> {
        self.reconcile(catalog_type_id, &DesiredState::new())
            .map(|outcome| outcome.report)
    }

    fn list(&self, catalog_type_id: &str) -> ReconcileResult<Vec<RemoteEntry>> {
        list_all(&self.client, catalog_type_id, self.config.page_size)
    }
}
