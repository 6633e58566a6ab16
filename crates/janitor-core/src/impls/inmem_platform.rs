//! InMemoryBuildPlatform - a simulated build platform for development.
//!
//! Deletes are asynchronous like on the real platform: `trigger_delete`
//! returns at once and a spawned task performs the deletion after
//! `callback_delay`, then posts the JSON result to the callback URL through a
//! [`CallbackRouter`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::error;

use crate::delete::CallbackRouter;
use crate::domain::{
    Build, BuildId, DeleteOperationResult, EntityKind, GroupBuild, GroupBuildId, RemoteError,
    ResultStatus, UnverifiedBuild,
};
use crate::ports::{BUILD_OUTPUT_OK_KEY, BuildRecordSource, RemoteEntitySource};

struct StoredBuild {
    build: Build,
    ended_at: DateTime<Utc>,
    group: Option<GroupBuildId>,
    attributes: HashMap<String, String>,
}

struct StoredGroupBuild {
    ended_at: DateTime<Utc>,
    temporary: bool,
}

#[derive(Default)]
struct PlatformState {
    builds: HashMap<BuildId, StoredBuild>,
    group_builds: HashMap<GroupBuildId, StoredGroupBuild>,
    /// Ids whose deletion is answered with a failure status.
    failing: HashMap<(EntityKind, String), ResultStatus>,
    /// Ids whose deletion is never answered.
    silent: HashSet<(EntityKind, String)>,
    unreachable: bool,
    delete_requests: Vec<(EntityKind, String)>,
}

impl PlatformState {
    /// Perform a deletion and produce the callback payload.
    fn apply_delete(&mut self, kind: EntityKind, id: &str) -> DeleteOperationResult {
        if let Some(status) = self.failing.get(&(kind, id.to_string())) {
            return DeleteOperationResult {
                status: Some(*status),
                message: Some(format!("deletion of {kind} {id} was refused")),
            };
        }

        let removed = match kind {
            EntityKind::Build => self.builds.remove(&BuildId::new(id)).is_some(),
            EntityKind::GroupBuild => {
                let group = GroupBuildId::new(id);
                let removed = self.group_builds.remove(&group).is_some();
                if removed {
                    self.builds
                        .retain(|_, stored| stored.group.as_ref() != Some(&group));
                }
                removed
            }
        };

        if removed {
            DeleteOperationResult::success()
        } else {
            DeleteOperationResult::failed(format!("{kind} {id} not found"))
        }
    }
}

pub struct InMemoryBuildPlatform {
    state: Arc<Mutex<PlatformState>>,
    callbacks: Arc<CallbackRouter>,
    callback_delay: Duration,
}

impl InMemoryBuildPlatform {
    pub fn new(callbacks: Arc<CallbackRouter>, callback_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState::default())),
            callbacks,
            callback_delay,
        }
    }

    /// Add a build that does not belong to any group build.
    pub async fn add_build(&self, build: Build, ended_at: DateTime<Utc>) {
        self.insert_build(build, ended_at, None).await;
    }

    pub async fn add_group_build(
        &self,
        id: &str,
        temporary: bool,
        ended_at: DateTime<Utc>,
        members: Vec<Build>,
    ) {
        let group = GroupBuildId::new(id);
        for build in members {
            self.insert_build(build, ended_at, Some(group.clone())).await;
        }
        let mut state = self.state.lock().await;
        state
            .group_builds
            .insert(group, StoredGroupBuild { ended_at, temporary });
    }

    async fn insert_build(&self, build: Build, ended_at: DateTime<Utc>, group: Option<GroupBuildId>) {
        let mut state = self.state.lock().await;
        state.builds.insert(
            build.id.clone(),
            StoredBuild {
                build,
                ended_at,
                group,
                attributes: HashMap::new(),
            },
        );
    }

    /// Answer every deletion of the `kind` entity `id` with `status`.
    pub async fn fail_deletion(&self, kind: EntityKind, id: &str, status: ResultStatus) {
        self.state
            .lock()
            .await
            .failing
            .insert((kind, id.to_string()), status);
    }

    /// Accept deletions of `id` but never call back.
    pub async fn never_answer(&self, kind: EntityKind, id: &str) {
        self.state.lock().await.silent.insert((kind, id.to_string()));
    }

    /// Make every call fail as if the platform were down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    pub async fn contains_build(&self, id: &str) -> bool {
        self.state.lock().await.builds.contains_key(&BuildId::new(id))
    }

    pub async fn contains_group_build(&self, id: &str) -> bool {
        self.state
            .lock()
            .await
            .group_builds
            .contains_key(&GroupBuildId::new(id))
    }

    pub async fn attribute(&self, id: &str, key: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .builds
            .get(&BuildId::new(id))
            .and_then(|stored| stored.attributes.get(key).cloned())
    }

    pub async fn delete_requests(&self) -> Vec<(EntityKind, String)> {
        self.state.lock().await.delete_requests.clone()
    }

    fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            message: "build platform unavailable".to_string(),
        }
    }
}

#[async_trait]
impl RemoteEntitySource for InMemoryBuildPlatform {
    async fn find_expired_builds(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Build>, RemoteError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(Self::unavailable());
        }
        Ok(state
            .builds
            .values()
            .filter(|s| s.build.temporary_build && s.group.is_none() && s.ended_at < threshold)
            .map(|s| s.build.clone())
            .collect())
    }

    async fn find_expired_group_builds(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<GroupBuild>, RemoteError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(Self::unavailable());
        }
        Ok(state
            .group_builds
            .iter()
            .filter(|(_, g)| g.temporary && g.ended_at < threshold)
            .map(|(id, _)| GroupBuild { id: id.clone() })
            .collect())
    }

    async fn trigger_delete(
        &self,
        kind: EntityKind,
        id: &str,
        callback_url: &str,
    ) -> Result<(), RemoteError> {
        {
            let mut state = self.state.lock().await;
            if state.unreachable {
                return Err(RemoteError::Transport("connection refused".to_string()));
            }
            state.delete_requests.push((kind, id.to_string()));
            if state.silent.contains(&(kind, id.to_string())) {
                return Ok(());
            }
        }

        let state = Arc::clone(&self.state);
        let callbacks = Arc::clone(&self.callbacks);
        let delay = self.callback_delay;
        let id = id.to_string();
        let callback_url = callback_url.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = state.lock().await.apply_delete(kind, &id);
            match serde_json::to_string(&result) {
                Ok(body) => {
                    if let Err(e) = callbacks.deliver_path(&callback_url, &body) {
                        error!(%kind, id, error = %e, "Callback delivery failed");
                    }
                }
                Err(e) => error!(%kind, id, error = %e, "Cannot encode callback payload"),
            }
        });
        Ok(())
    }
}

#[async_trait]
impl BuildRecordSource for InMemoryBuildPlatform {
    async fn list_unverified(&self) -> Result<Vec<UnverifiedBuild>, RemoteError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(Self::unavailable());
        }
        let mut unverified: Vec<UnverifiedBuild> = state
            .builds
            .values()
            .filter(|s| !s.attributes.contains_key(BUILD_OUTPUT_OK_KEY))
            .filter_map(|s| {
                s.build
                    .build_output_checksum
                    .as_ref()
                    .map(|checksum| UnverifiedBuild {
                        id: s.build.id.clone(),
                        stored_checksum: checksum.clone(),
                    })
            })
            .collect();
        unverified.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(unverified)
    }

    async fn flag_outcome(&self, id: &BuildId, checksum_match: bool) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        if state.unreachable {
            return Err(Self::unavailable());
        }
        let stored = state.builds.get_mut(id).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("build {id} not found"),
        })?;
        stored
            .attributes
            .insert(BUILD_OUTPUT_OK_KEY.to_string(), checksum_match.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationRegistry;
    use crate::observability::Observability;
    use chrono::Duration as Days;

    fn platform() -> (InMemoryBuildPlatform, Arc<CallbackRouter>) {
        let obs = Arc::new(Observability::new());
        let router = Arc::new(CallbackRouter::new(
            Arc::new(CorrelationRegistry::new(EntityKind::Build, obs.clone())),
            Arc::new(CorrelationRegistry::new(EntityKind::GroupBuild, obs)),
        ));
        (
            InMemoryBuildPlatform::new(router.clone(), Duration::from_millis(5)),
            router,
        )
    }

    #[tokio::test]
    async fn lists_only_expired_independent_temporary_builds() {
        let (platform, _) = platform();
        let now = Utc::now();
        platform.add_build(Build::temporary("old"), now - Days::days(30)).await;
        platform.add_build(Build::temporary("new"), now).await;
        let mut persistent = Build::temporary("kept");
        persistent.temporary_build = false;
        platform.add_build(persistent, now - Days::days(30)).await;
        platform
            .add_group_build("g", true, now - Days::days(30), vec![Build::temporary("member")])
            .await;

        let expired = platform.find_expired_builds(now - Days::days(14)).await.unwrap();
        let ids: Vec<&str> = expired.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["old"]);

        let groups = platform
            .find_expired_group_builds(now - Days::days(14))
            .await
            .unwrap();
        assert_eq!(groups, vec![GroupBuild::new("g")]);
    }

    #[tokio::test]
    async fn delete_calls_back_through_the_router() {
        let (platform, router) = platform();
        platform.add_build(Build::temporary("b1"), Utc::now()).await;
        let registry = router.registry(EntityKind::Build);
        registry.initialize("b1");

        platform
            .trigger_delete(
                EntityKind::Build,
                "b1",
                "http://janitor/callbacks/delete/builds/b1",
            )
            .await
            .unwrap();
        let got = registry
            .await_result("b1", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(got, Some(DeleteOperationResult::success()));
        assert!(!platform.contains_build("b1").await);
    }

    #[tokio::test]
    async fn group_deletion_removes_members() {
        let (platform, router) = platform();
        platform
            .add_group_build("g1", true, Utc::now(), vec![Build::temporary("m1")])
            .await;
        let registry = router.registry(EntityKind::GroupBuild);
        registry.initialize("g1");

        platform
            .trigger_delete(EntityKind::GroupBuild, "g1", "/callbacks/delete/group-builds/g1")
            .await
            .unwrap();
        registry
            .await_result("g1", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!platform.contains_group_build("g1").await);
        assert!(!platform.contains_build("m1").await);
    }

    #[tokio::test]
    async fn failure_scripts_are_per_kind() {
        let (platform, router) = platform();
        platform.add_build(Build::temporary("7"), Utc::now()).await;
        platform.add_group_build("7", true, Utc::now(), Vec::new()).await;
        platform
            .fail_deletion(EntityKind::Build, "7", ResultStatus::Failed)
            .await;
        platform.never_answer(EntityKind::Build, "8").await;

        for kind in EntityKind::ALL {
            router.registry(kind).initialize("7");
            platform
                .trigger_delete(kind, "7", &format!("/callbacks/delete/{}/7", kind.callback_segment()))
                .await
                .unwrap();
        }
        let build = router
            .registry(EntityKind::Build)
            .await_result("7", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let group = router
            .registry(EntityKind::GroupBuild)
            .await_result("7", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(build.status, Some(ResultStatus::Failed));
        assert_eq!(group, Some(DeleteOperationResult::success()));
        assert!(platform.contains_build("7").await);
        assert!(!platform.contains_group_build("7").await);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_script_only_mutes_its_kind() {
        let (platform, router) = platform();
        platform.add_group_build("8", true, Utc::now(), Vec::new()).await;
        platform.never_answer(EntityKind::Build, "8").await;
        let registry = router.registry(EntityKind::GroupBuild);
        registry.initialize("8");

        platform
            .trigger_delete(EntityKind::GroupBuild, "8", "/callbacks/delete/group-builds/8")
            .await
            .unwrap();

        assert_eq!(
            registry.await_result("8", Duration::from_secs(5)).await.unwrap(),
            Some(DeleteOperationResult::success())
        );
    }

    #[tokio::test]
    async fn flagging_hides_build_from_unverified_listing() {
        let (platform, _) = platform();
        platform
            .add_build(Build::temporary("b1").with_checksum("abc"), Utc::now())
            .await;
        platform.add_build(Build::temporary("b2"), Utc::now()).await;

        assert_eq!(
            platform.list_unverified().await.unwrap(),
            vec![UnverifiedBuild::new("b1", "abc")]
        );

        platform.flag_outcome(&BuildId::new("b1"), false).await.unwrap();
        assert!(platform.list_unverified().await.unwrap().is_empty());
        assert_eq!(
            platform.attribute("b1", BUILD_OUTPUT_OK_KEY).await.as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn unreachable_platform_fails_every_call() {
        let (platform, _) = platform();
        platform.set_unreachable(true).await;

        assert!(platform.find_expired_builds(Utc::now()).await.is_err());
        assert!(platform.list_unverified().await.is_err());
        assert!(matches!(
            platform
                .trigger_delete(EntityKind::Build, "b1", "/callbacks/delete/builds/b1")
                .await,
            Err(RemoteError::Transport(_))
        ));
        assert!(platform.delete_requests().await.is_empty());
    }
}
