//! RemoteEntitySource port - the build platform as seen by the cleanup side.
//!
//! Deletion on the platform is asynchronous: `trigger_delete` only asks for it,
//! and the platform later POSTs the result to `callback_url`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Build, EntityKind, GroupBuild, RemoteError};

#[async_trait]
pub trait RemoteEntitySource: Send + Sync {
    /// Temporary builds not belonging to a group build, older than `threshold`.
    async fn find_expired_builds(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Build>, RemoteError>;

    /// Temporary group builds that ended before `threshold`.
    async fn find_expired_group_builds(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<GroupBuild>, RemoteError>;

    /// Ask the platform to delete an entity and to report to `callback_url`.
    async fn trigger_delete(
        &self,
        kind: EntityKind,
        id: &str,
        callback_url: &str,
    ) -> Result<(), RemoteError>;
}
