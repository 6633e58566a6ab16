//! Remote entity records as the build platform reports them.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::ids::{BuildId, GroupBuildId};

/// A build record.
///
/// Two records with the same id are the same build, whatever the other fields
/// say, so listings from different rounds can be compared as sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_output_checksum: Option<String>,

    #[serde(default)]
    pub temporary_build: bool,
}

impl Build {
    pub fn temporary(id: impl Into<String>) -> Self {
        Self {
            id: BuildId::new(id),
            build_output_checksum: None,
            temporary_build: true,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.build_output_checksum = Some(checksum.into());
        self
    }
}

impl PartialEq for Build {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Build {}

impl Hash for Build {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A group build (the record of a build config set run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupBuild {
    pub id: GroupBuildId,
}

impl GroupBuild {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: GroupBuildId::new(id),
        }
    }
}

/// A finished build whose output has not been cross-checked yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnverifiedBuild {
    pub id: BuildId,
    pub stored_checksum: String,
}

impl UnverifiedBuild {
    pub fn new(id: impl Into<String>, stored_checksum: impl Into<String>) -> Self {
        Self {
            id: BuildId::new(id),
            stored_checksum: stored_checksum.into(),
        }
    }
}
