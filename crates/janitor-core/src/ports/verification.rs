//! Verification ports - build records and the log store.

use async_trait::async_trait;

use crate::domain::{BuildId, RemoteError, UnverifiedBuild};

/// Attribute written on a build once its output has been checked.
pub const BUILD_OUTPUT_OK_KEY: &str = "BUILD_OUTPUT_OK";

/// Build records on the build platform.
#[async_trait]
pub trait BuildRecordSource: Send + Sync {
    /// Finished builds with a stored output checksum and no verification flag.
    async fn list_unverified(&self) -> Result<Vec<UnverifiedBuild>, RemoteError>;

    /// Persist the verification verdict (`BUILD_OUTPUT_OK=true|false`).
    async fn flag_outcome(&self, id: &BuildId, checksum_match: bool) -> Result<(), RemoteError>;
}

/// The store holding the build logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Digest of the build log as the log store computed it.
    async fn checksum(&self, id: &BuildId) -> Result<String, RemoteError>;
}
