//! VerificationEngine - cross-checks build output checksums against the logs.
//!
//! A mismatch is not flagged straight away: the log store may still be
//! ingesting the log. Each build gets `max_retries` tolerated mismatches; the
//! next one flags it as failed. A match at any point flags it as verified.
//! Counters live in memory only and start from zero after a restart.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::JanitorConfig;
use crate::domain::{BuildId, Component, Operation, UnverifiedBuild, VerificationState};
use crate::observability::Observability;
use crate::ports::{BuildRecordSource, LogStore};

pub struct VerificationEngine {
    records: Arc<dyn BuildRecordSource>,
    log_store: Arc<dyn LogStore>,
    max_retries: u32,
    retry_counters: DashMap<BuildId, u32>,
    observability: Arc<Observability>,
}

impl VerificationEngine {
    pub fn new(
        records: Arc<dyn BuildRecordSource>,
        log_store: Arc<dyn LogStore>,
        config: &JanitorConfig,
        observability: Arc<Observability>,
    ) -> Self {
        Self {
            records,
            log_store,
            max_retries: config.max_verification_retries,
            retry_counters: DashMap::new(),
            observability,
        }
    }

    /// Verify every build that has not been flagged yet. Returns how many
    /// builds were examined.
    pub async fn verify_unflagged_builds(&self) -> usize {
        info!("Verifying log checksums of unflagged builds");
        let timer = self.observability.start(Operation::VerifyUnflaggedBuilds);

        let builds = self.list_unverified().await;
        debug!(count = builds.len(), "Found unverified builds");
        let mut flagged = 0;
        for build in &builds {
            if self.verify(build).await.is_terminal() {
                flagged += 1;
            }
        }

        self.observability.observe(timer);
        info!(examined = builds.len(), flagged, "Verification of unflagged builds finished");
        builds.len()
    }

    /// Compare one build's stored checksum with the log store's.
    ///
    /// When the log store cannot be read nothing changes and the build's
    /// current state is returned (`Unflagged` or `MismatchRetrying`); it comes
    /// back in the next run.
    pub async fn verify(&self, build: &UnverifiedBuild) -> VerificationState {
        let timer = self.observability.start(Operation::Verify);
        let id = &build.id;

        let log_checksum = match self.log_store.checksum(id).await {
            Ok(checksum) => checksum,
            Err(e) => {
                self.observability.error(Component::VerificationEngine);
                error!(build = %id, status = ?e.status(), error = %e, "Cannot read log checksum");
                return self.state(id);
            }
        };

        let state = if log_checksum == build.stored_checksum {
            info!(build = %id, "Build output checksum OK");
            self.flag(id, true).await;
            self.retry_counters.remove(id);
            VerificationState::Verified
        } else {
            self.observability.warn(Component::VerificationEngine);
            warn!(
                build = %id,
                stored = %build.stored_checksum,
                log = %log_checksum,
                "Build output checksum mismatch"
            );
            self.on_mismatch(id).await
        };

        self.observability.observe(timer);
        state
    }

    /// In-memory state of a build that has not been flagged by this engine.
    pub fn state(&self, id: &BuildId) -> VerificationState {
        match self.retry_count(id) {
            Some(n) => VerificationState::MismatchRetrying(n),
            None => VerificationState::Unflagged,
        }
    }

    /// Mismatches recorded for `id` since its counter was last cleared.
    pub fn retry_count(&self, id: &BuildId) -> Option<u32> {
        self.retry_counters.get(id).map(|count| *count)
    }

    async fn on_mismatch(&self, id: &BuildId) -> VerificationState {
        // カウンタの判定と更新はエントリロック内で行い、
        // リモートへのフラグ書き込みはロック解放後に行う
        let retries = match self.retry_counters.entry(id.clone()) {
            Entry::Occupied(entry) if *entry.get() >= self.max_retries => {
                entry.remove();
                None
            }
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += 1;
                Some(*entry.get())
            }
            Entry::Vacant(_) if self.max_retries == 0 => None,
            Entry::Vacant(entry) => {
                entry.insert(1);
                Some(1)
            }
        };

        match retries {
            Some(n) => {
                info!(build = %id, retries = n, max_retries = self.max_retries, "Retrying verification later");
                VerificationState::MismatchRetrying(n)
            }
            None => {
                warn!(build = %id, "Marking build output as mismatching");
                self.flag(id, false).await;
                VerificationState::Failed
            }
        }
    }

    async fn flag(&self, id: &BuildId, checksum_match: bool) {
        if let Err(e) = self.records.flag_outcome(id, checksum_match).await {
            self.observability.error(Component::VerificationEngine);
            error!(build = %id, checksum_match, status = ?e.status(), error = %e, "Cannot flag build");
        }
    }

    async fn list_unverified(&self) -> Vec<UnverifiedBuild> {
        let timer = self.observability.start(Operation::ListUnverifiedBuilds);
        match self.records.list_unverified().await {
            Ok(builds) => {
                self.observability.observe(timer);
                builds
            }
            Err(e) => {
                self.observability.error(Component::VerificationEngine);
                error!(status = ?e.status(), error = %e, "Listing of unverified builds failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteError;
    use crate::impls::InMemoryLogStore;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRecords {
        unverified: Mutex<Vec<UnverifiedBuild>>,
        flags: Mutex<Vec<(String, bool)>>,
        fail_listing: bool,
        fail_flagging: bool,
    }

    impl RecordingRecords {
        fn flags(&self) -> Vec<(String, bool)> {
            self.flags.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BuildRecordSource for RecordingRecords {
        async fn list_unverified(&self) -> Result<Vec<UnverifiedBuild>, RemoteError> {
            if self.fail_listing {
                return Err(RemoteError::Transport("timeout".to_string()));
            }
            Ok(self.unverified.lock().unwrap().clone())
        }

        async fn flag_outcome(&self, id: &BuildId, checksum_match: bool) -> Result<(), RemoteError> {
            self.flags
                .lock()
                .unwrap()
                .push((id.to_string(), checksum_match));
            if self.fail_flagging {
                return Err(RemoteError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        engine: VerificationEngine,
        records: Arc<RecordingRecords>,
        logs: Arc<InMemoryLogStore>,
        obs: Arc<Observability>,
    }

    fn fixture(records: RecordingRecords, max_retries: u32) -> Fixture {
        let records = Arc::new(records);
        let logs = Arc::new(InMemoryLogStore::new());
        let obs = Arc::new(Observability::new());
        let config = JanitorConfig {
            max_verification_retries: max_retries,
            ..Default::default()
        };
        let engine = VerificationEngine::new(records.clone(), logs.clone(), &config, obs.clone());
        Fixture {
            engine,
            records,
            logs,
            obs,
        }
    }

    #[tokio::test]
    async fn mismatches_beyond_the_retry_budget_flag_failure() {
        let f = fixture(RecordingRecords::default(), 2);
        f.logs.set_checksum("b1", "xyz").await;
        let build = UnverifiedBuild::new("b1", "abc");
        let id = BuildId::new("b1");

        assert_eq!(
            f.engine.verify(&build).await,
            VerificationState::MismatchRetrying(1)
        );
        assert_eq!(f.engine.retry_count(&id), Some(1));
        assert_eq!(
            f.engine.verify(&build).await,
            VerificationState::MismatchRetrying(2)
        );
        assert!(f.records.flags().is_empty());

        assert_eq!(f.engine.verify(&build).await, VerificationState::Failed);
        assert_eq!(f.records.flags(), vec![("b1".to_string(), false)]);
        assert_eq!(f.engine.retry_count(&id), None);
        assert_eq!(f.obs.warnings(Component::VerificationEngine), 3);
    }

    #[tokio::test]
    async fn late_match_clears_the_counter() {
        let f = fixture(RecordingRecords::default(), 3);
        f.logs
            .set_checksums("b1", ["stale".to_string(), "abc".to_string()])
            .await;
        let build = UnverifiedBuild::new("b1", "abc");

        assert_eq!(
            f.engine.verify(&build).await,
            VerificationState::MismatchRetrying(1)
        );
        assert_eq!(f.engine.verify(&build).await, VerificationState::Verified);

        assert_eq!(f.records.flags(), vec![("b1".to_string(), true)]);
        assert_eq!(f.engine.retry_count(&BuildId::new("b1")), None);
    }

    #[tokio::test]
    async fn zero_retries_fail_on_first_mismatch() {
        let f = fixture(RecordingRecords::default(), 0);
        f.logs.set_checksum("b1", "xyz").await;

        assert_eq!(
            f.engine.verify(&UnverifiedBuild::new("b1", "abc")).await,
            VerificationState::Failed
        );
        assert_eq!(f.records.flags(), vec![("b1".to_string(), false)]);
    }

    #[tokio::test]
    async fn counters_are_per_build() {
        let f = fixture(RecordingRecords::default(), 1);
        f.logs.set_checksum("b1", "xyz").await;
        f.logs.set_checksum("b2", "xyz").await;
        let b1 = UnverifiedBuild::new("b1", "abc");
        let b2 = UnverifiedBuild::new("b2", "abc");

        f.engine.verify(&b1).await;
        assert_eq!(
            f.engine.verify(&b2).await,
            VerificationState::MismatchRetrying(1)
        );
        assert_eq!(f.engine.verify(&b1).await, VerificationState::Failed);
        assert_eq!(f.engine.retry_count(&BuildId::new("b2")), Some(1));
    }

    #[tokio::test]
    async fn unreadable_log_leaves_build_untouched() {
        let f = fixture(RecordingRecords::default(), 2);

        assert_eq!(
            f.engine.verify(&UnverifiedBuild::new("nolog", "abc")).await,
            VerificationState::Unflagged
        );
        assert!(f.records.flags().is_empty());
        assert_eq!(f.engine.retry_count(&BuildId::new("nolog")), None);
        assert_eq!(f.obs.errors(Component::VerificationEngine), 1);
    }

    #[tokio::test]
    async fn unreadable_log_reports_pending_retries() {
        let f = fixture(RecordingRecords::default(), 3);
        f.logs.set_checksum("b1", "xyz").await;
        let build = UnverifiedBuild::new("b1", "abc");
        assert_eq!(f.engine.verify(&build).await, VerificationState::MismatchRetrying(1));

        f.logs.set_checksums("b1", Vec::<String>::new()).await;
        let state = f.engine.verify(&build).await;

        assert_eq!(state, VerificationState::MismatchRetrying(1));
        assert!(!state.is_terminal());
        assert_eq!(f.engine.retry_count(&BuildId::new("b1")), Some(1));
    }

    #[rstest]
    #[case::matching("abc", VerificationState::Verified)]
    #[case::mismatching("xyz", VerificationState::Failed)]
    #[tokio::test]
    async fn flag_failure_is_logged_and_counter_still_cleared(
        #[case] log_checksum: &str,
        #[case] expected: VerificationState,
    ) {
        let records = RecordingRecords {
            fail_flagging: true,
            ..Default::default()
        };
        let f = fixture(records, 0);
        f.logs.set_checksum("b1", log_checksum).await;

        assert_eq!(f.engine.verify(&UnverifiedBuild::new("b1", "abc")).await, expected);
        assert_eq!(f.records.flags().len(), 1);
        assert_eq!(f.engine.retry_count(&BuildId::new("b1")), None);
        assert_eq!(f.obs.errors(Component::VerificationEngine), 1);
    }

    #[tokio::test]
    async fn unflagged_run_visits_every_listed_build() {
        let records = RecordingRecords::default();
        *records.unverified.lock().unwrap() = vec![
            UnverifiedBuild::new("ok", "abc"),
            UnverifiedBuild::new("bad", "abc"),
            UnverifiedBuild::new("nolog", "abc"),
        ];
        let f = fixture(records, 0);
        f.logs.set_checksum("ok", "abc").await;
        f.logs.set_checksum("bad", "xyz").await;

        assert_eq!(f.engine.verify_unflagged_builds().await, 3);
        assert_eq!(
            f.records.flags(),
            vec![("ok".to_string(), true), ("bad".to_string(), false)]
        );
        assert!(f.obs.latency(Operation::VerifyUnflaggedBuilds).is_some());
    }

    #[tokio::test]
    async fn listing_failure_verifies_nothing() {
        let records = RecordingRecords {
            fail_listing: true,
            ..Default::default()
        };
        let f = fixture(records, 2);

        assert_eq!(f.engine.verify_unflagged_builds().await, 0);
        assert!(f.records.flags().is_empty());
        assert_eq!(f.obs.errors(Component::VerificationEngine), 1);
    }
}
