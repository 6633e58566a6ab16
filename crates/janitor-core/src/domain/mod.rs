//! Domain model (ids, entity kinds, records, outcomes, states, errors).

pub mod entity;
pub mod errors;
pub mod ids;
pub mod kind;
pub mod outcome;
pub mod state;

pub use entity::{Build, GroupBuild, UnverifiedBuild};
pub use errors::{JanitorError, RemoteError, Result};
pub use ids::{BuildId, GroupBuildId, Id, IdMarker};
pub use kind::{Component, EntityKind, Operation};
pub use outcome::{DeleteOperationResult, DeleteOutcome, ResultStatus};
pub use state::VerificationState;
