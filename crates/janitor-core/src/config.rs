//! Janitor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{JanitorError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// Public base URI of this service, used to build callback URLs.
    pub application_uri: String,

    /// Longest wait for a delete callback, in seconds.
    pub max_delete_wait_secs: u64,

    /// Age in days after which temporary builds and group builds expire.
    pub lifespan_days: u32,

    /// Upper bound on enumerations in one build cleanup pass.
    pub max_cleanup_rounds: usize,

    /// Consecutive checksum mismatches tolerated before a build is flagged.
    pub max_verification_retries: u32,

    /// Seconds between cleanup cycles.
    pub cleanup_interval_secs: u64,

    /// Seconds between verification runs.
    pub verification_interval_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            application_uri: "http://localhost:8080".to_string(),
            max_delete_wait_secs: 600,
            lifespan_days: 14,
            max_cleanup_rounds: 100,
            max_verification_retries: 3,
            cleanup_interval_secs: 24 * 60 * 60,
            verification_interval_secs: 10 * 60,
        }
    }
}

impl JanitorConfig {
    pub fn max_delete_wait(&self) -> Duration {
        Duration::from_secs(self.max_delete_wait_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn verification_interval(&self) -> Duration {
        Duration::from_secs(self.verification_interval_secs)
    }

    /// Reject values that would make the janitor misbehave rather than fail.
    pub fn validate(&self) -> Result<()> {
        if self.application_uri.trim().is_empty() {
            return Err(JanitorError::InvalidConfig(
                "application_uri must not be empty".to_string(),
            ));
        }
        if self.max_delete_wait_secs == 0 {
            return Err(JanitorError::InvalidConfig(
                "max_delete_wait_secs must be positive".to_string(),
            ));
        }
        if self.lifespan_days == 0 {
            return Err(JanitorError::InvalidConfig(
                "lifespan_days must be positive".to_string(),
            ));
        }
        if self.max_cleanup_rounds == 0 {
            return Err(JanitorError::InvalidConfig(
                "max_cleanup_rounds must be positive".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 || self.verification_interval_secs == 0 {
            return Err(JanitorError::InvalidConfig(
                "scheduling intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
