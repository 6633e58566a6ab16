//! CleanupDriver - periodic removal of expired temporary builds.
//!
//! One cleanup cycle runs two passes, group builds first:
//! - group builds: a single sweep, failures are logged and skipped
//! - builds: a convergence loop (see [`ConvergenceLoop`]) that re-enumerates
//!   until nothing but already-failed builds is left
//!
//! Neither pass aborts because one entity could not be deleted. Whatever is
//! left behind is picked up again by the next cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::convergence::ConvergenceLoop;
use crate::config::JanitorConfig;
use crate::delete::DeleteCoordinator;
use crate::domain::{Build, Component, DeleteOutcome, EntityKind, GroupBuild, Operation};
use crate::observability::Observability;
use crate::ports::{Clock, RemoteEntitySource};

/// Result of one pass over one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Enumerations performed, including the closing one that found nothing
    /// left to attempt.
    pub rounds: usize,
    /// Delete attempts, counting re-attempts of lagging entities.
    pub attempted: usize,
    /// Attempts confirmed by a success callback.
    pub succeeded: usize,
    /// Ids whose deletion failed, sorted.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub threshold: DateTime<Utc>,
    pub group_builds: PassReport,
    pub builds: PassReport,
}

pub struct CleanupDriver {
    source: Arc<dyn RemoteEntitySource>,
    builds: DeleteCoordinator,
    group_builds: DeleteCoordinator,
    clock: Arc<dyn Clock>,
    lifespan_days: u32,
    max_rounds: usize,
    observability: Arc<Observability>,
}

impl CleanupDriver {
    pub fn new(
        source: Arc<dyn RemoteEntitySource>,
        builds: DeleteCoordinator,
        group_builds: DeleteCoordinator,
        clock: Arc<dyn Clock>,
        config: &JanitorConfig,
        observability: Arc<Observability>,
    ) -> Self {
        debug_assert_eq!(builds.kind(), EntityKind::Build);
        debug_assert_eq!(group_builds.kind(), EntityKind::GroupBuild);
        Self {
            source,
            builds,
            group_builds,
            clock,
            lifespan_days: config.lifespan_days,
            max_rounds: config.max_cleanup_rounds,
            observability,
        }
    }

    /// Run one full cleanup cycle with the threshold taken from the clock.
    pub async fn cleanup_expired(&self) -> CleanupReport {
        info!(
            lifespan_days = self.lifespan_days,
            "Regular cleanup of expired temporary builds started"
        );
        let threshold = self.clock.days_ago(self.lifespan_days);

        let group_builds = self.delete_expired_group_builds(threshold).await;
        let builds = self.delete_expired_builds(threshold).await;

        info!(
            group_builds_deleted = group_builds.succeeded,
            group_builds_failed = group_builds.failed.len(),
            builds_deleted = builds.succeeded,
            builds_failed = builds.failed.len(),
            "Regular cleanup of expired temporary builds finished"
        );
        CleanupReport {
            threshold,
            group_builds,
            builds,
        }
    }

    /// Delete every temporary group build older than `threshold`, once.
    pub async fn delete_expired_group_builds(&self, threshold: DateTime<Utc>) -> PassReport {
        let timer = self.observability.start(Operation::DeleteExpiredGroupBuilds);
        let mut report = PassReport {
            rounds: 1,
            ..Default::default()
        };

        for group_build in self.find_expired_group_builds(threshold).await {
            let id = group_build.id.as_str();
            report.attempted += 1;
            if self.attempt(&self.group_builds, id).await {
                report.succeeded += 1;
            } else {
                report.failed.push(id.to_string());
            }
        }

        report.failed.sort();
        self.observability.observe(timer);
        report
    }

    /// Delete temporary builds older than `threshold` until none is left
    /// apart from those that failed during this call.
    pub async fn delete_expired_builds(&self, threshold: DateTime<Utc>) -> PassReport {
        let timer = self.observability.start(Operation::DeleteExpiredBuilds);
        let mut convergence = ConvergenceLoop::<Build>::new();
        let mut report = PassReport::default();

        loop {
            if convergence.rounds() >= self.max_rounds {
                self.observability.warn(Component::CleanupDriver);
                warn!(
                    rounds = convergence.rounds(),
                    "Temporary builds deletion did not converge, leaving the rest to the next cycle"
                );
                break;
            }

            info!(round = convergence.rounds() + 1, "Doing an iteration of temporary builds deletion");
            let expired = self.find_expired_builds(threshold).await;
            let Some(batch) = convergence.next_round(expired) else {
                break;
            };

            for build in batch {
                report.attempted += 1;
                if self.attempt(&self.builds, build.id.as_str()).await {
                    report.succeeded += 1;
                } else {
                    convergence.mark_failed(build);
                }
            }
        }

        report.rounds = convergence.rounds();
        report.failed = convergence
            .into_failed()
            .into_iter()
            .map(|build| build.id.into_inner())
            .collect();
        report.failed.sort();
        self.observability.observe(timer);
        report
    }

    /// Delete one entity; true only on a confirmed deletion.
    async fn attempt(&self, coordinator: &DeleteCoordinator, id: &str) -> bool {
        let kind = coordinator.kind();
        info!(%kind, id, "Deleting temporary {kind}");
        match coordinator.delete(self.source.as_ref(), id).await {
            Ok(DeleteOutcome::Success) => {
                info!(%kind, id, "Temporary {kind} was deleted successfully");
                true
            }
            Ok(outcome) => {
                self.observability.warn(Component::CleanupDriver);
                warn!(%kind, id, ?outcome, "Deletion of temporary {kind} failed");
                false
            }
            Err(e) => {
                self.observability.warn(Component::CleanupDriver);
                warn!(%kind, id, error = %e, "Deletion of temporary {kind} failed");
                false
            }
        }
    }

    async fn find_expired_builds(&self, threshold: DateTime<Utc>) -> Vec<Build> {
        let timer = self.observability.start(Operation::FindExpiredBuilds);
        match self.source.find_expired_builds(threshold).await {
            Ok(builds) => {
                self.observability.observe(timer);
                debug!(count = builds.len(), %threshold, "Found expired temporary builds");
                builds
            }
            Err(e) => {
                self.observability.warn(Component::CleanupDriver);
                warn!(status = ?e.status(), error = %e, "Querying of temporary builds failed");
                Vec::new()
            }
        }
    }

    async fn find_expired_group_builds(&self, threshold: DateTime<Utc>) -> Vec<GroupBuild> {
        let timer = self.observability.start(Operation::FindExpiredGroupBuilds);
        match self.source.find_expired_group_builds(threshold).await {
            Ok(group_builds) => {
                self.observability.observe(timer);
                debug!(count = group_builds.len(), %threshold, "Found expired temporary group builds");
                group_builds
            }
            Err(e) => {
                self.observability.warn(Component::CleanupDriver);
                warn!(status = ?e.status(), error = %e, "Querying of temporary group builds failed");
                Vec::new()
            }
        }
    }
}
