//! Typed tags for entity kinds and timed operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of remote entities the janitor deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Build,
    GroupBuild,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Build, EntityKind::GroupBuild];

    /// Path segment of the delete callback endpoint for this kind.
    pub fn callback_segment(self) -> &'static str {
        match self {
            EntityKind::Build => "builds",
            EntityKind::GroupBuild => "group-builds",
        }
    }

    pub fn from_callback_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.callback_segment() == segment)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Build => f.write_str("build"),
            EntityKind::GroupBuild => f.write_str("group build"),
        }
    }
}

/// Every operation whose latency is tracked.
///
/// Replaces string keys composed from class and method names: a typo here is a
/// compile error instead of a silent lookup miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FindExpiredBuilds,
    FindExpiredGroupBuilds,
    DeleteBuild,
    DeleteGroupBuild,
    AwaitCallback,
    DeleteExpiredBuilds,
    DeleteExpiredGroupBuilds,
    VerifyUnflaggedBuilds,
    Verify,
    ListUnverifiedBuilds,
}

impl Operation {
    pub fn delete_of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Build => Operation::DeleteBuild,
            EntityKind::GroupBuild => Operation::DeleteGroupBuild,
        }
    }
}

/// Component tag for warning/error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    CorrelationRegistry,
    DeleteCoordinator,
    CleanupDriver,
    VerificationEngine,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EntityKind::Build, "builds")]
    #[case(EntityKind::GroupBuild, "group-builds")]
    fn callback_segment_roundtrips(#[case] kind: EntityKind, #[case] segment: &str) {
        assert_eq!(kind.callback_segment(), segment);
        assert_eq!(EntityKind::from_callback_segment(segment), Some(kind));
    }

    #[test]
    fn unknown_segment_is_rejected() {
        assert_eq!(EntityKind::from_callback_segment("artifacts"), None);
    }

    #[test]
    fn operation_serializes_as_snake_case() {
        let s = serde_json::to_string(&Operation::FindExpiredGroupBuilds).unwrap();
        assert_eq!(s, "\"find_expired_group_builds\"");
    }
}
