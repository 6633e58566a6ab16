//! CallbackRouter - inbound delete notifications.
//!
//! The platform POSTs a `DeleteOperationResult` to
//! `/callbacks/delete/builds/{id}` or `/callbacks/delete/group-builds/{id}`.
//! Whatever transport receives that request hands the path and body here.

use std::sync::Arc;
use tracing::debug;

use super::CALLBACK_PREFIX;
use crate::correlation::CorrelationRegistry;
use crate::domain::{DeleteOperationResult, EntityKind, JanitorError, Result};

pub struct CallbackRouter {
    builds: Arc<CorrelationRegistry>,
    group_builds: Arc<CorrelationRegistry>,
}

impl CallbackRouter {
    pub fn new(builds: Arc<CorrelationRegistry>, group_builds: Arc<CorrelationRegistry>) -> Self {
        Self {
            builds,
            group_builds,
        }
    }

    pub fn registry(&self, kind: EntityKind) -> &Arc<CorrelationRegistry> {
        match kind {
            EntityKind::Build => &self.builds,
            EntityKind::GroupBuild => &self.group_builds,
        }
    }

    pub fn deliver(&self, kind: EntityKind, id: &str, result: DeleteOperationResult) {
        debug!(%kind, id, status = ?result.status, "Delete callback received");
        self.registry(kind).callback(id, result);
    }

    /// Route a raw notification. `target` is the request path, or a full URL
    /// containing it; `body` is the JSON payload.
    pub fn deliver_path(&self, target: &str, body: &str) -> Result<()> {
        let (kind, id) = parse_callback_target(target)?;
        let result: DeleteOperationResult = serde_json::from_str(body)
            .map_err(|e| JanitorError::InvalidCallback(format!("malformed payload: {e}")))?;
        self.deliver(kind, id, result);
        Ok(())
    }
}

fn parse_callback_target(target: &str) -> Result<(EntityKind, &str)> {
    let invalid = || JanitorError::InvalidCallback(format!("unknown callback target {target}"));

    let start = target.find(CALLBACK_PREFIX).ok_or_else(invalid)?;
    let rest = &target[start + CALLBACK_PREFIX.len()..];
    let (segment, id) = rest.split_once('/').ok_or_else(invalid)?;
    let kind = EntityKind::from_callback_segment(segment).ok_or_else(invalid)?;
    if id.is_empty() || id.contains('/') {
        return Err(invalid());
    }
    Ok((kind, id))
}
