//! DeleteCoordinator - delete a remote entity and wait for its callback.
//!
//! # フロー
//! 1. 種別ごとの `CorrelationRegistry` に ID を登録
//! 2. リモート削除を要求（完了時にプラットフォームが callback する）
//! 3. `max_delete_wait` を上限に callback を待つ
//! 4. 判定: 成功 / 失敗の報告 / タイムアウト

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::JanitorConfig;
use crate::correlation::CorrelationRegistry;
use crate::domain::{
    Component, DeleteOperationResult, DeleteOutcome, EntityKind, JanitorError, Operation,
    RemoteError, Result,
};
use crate::observability::Observability;
use crate::ports::RemoteEntitySource;

pub struct DeleteCoordinator {
    registry: Arc<CorrelationRegistry>,
    max_wait: Duration,
    callback_base: String,
    observability: Arc<Observability>,
}

impl DeleteCoordinator {
    /// The coordinator's entity kind is the registry's kind.
    pub fn new(
        registry: Arc<CorrelationRegistry>,
        config: &JanitorConfig,
        observability: Arc<Observability>,
    ) -> Self {
        let callback_base = format!(
            "{}{}{}/",
            config.application_uri.trim_end_matches('/'),
            super::CALLBACK_PREFIX,
            registry.kind().callback_segment()
        );
        Self {
            registry,
            max_wait: config.max_delete_wait(),
            callback_base,
            observability,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.registry.kind()
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Where the platform should report completion of deleting `id`.
    pub fn callback_url(&self, id: &str) -> String {
        format!("{}{}", self.callback_base, id)
    }

    /// Delete `id` through `source` and wait for the outcome.
    pub async fn delete(&self, source: &dyn RemoteEntitySource, id: &str) -> Result<DeleteOutcome> {
        let kind = self.kind();
        let callback_url = self.callback_url(id);
        self.delete_and_await(id, move |id| async move {
            source.trigger_delete(kind, &id, &callback_url).await
        })
        .await
    }

    /// Register `id`, run `trigger`, and wait for the correlated callback.
    ///
    /// Fails with `AlreadyInProgress` if a delete of `id` is already pending.
    /// Every other path returns an outcome and leaves no pending entry behind.
    pub async fn delete_and_await<F, Fut>(&self, id: &str, trigger: F) -> Result<DeleteOutcome>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<(), RemoteError>>,
    {
        let kind = self.kind();
        let timer = self.observability.start(Operation::delete_of(kind));

        if let Err(e) = self.registry.register(id) {
            self.observability.error(Component::DeleteCoordinator);
            debug!(%kind, id, error = %e, "Deletion already pending");
            return Err(JanitorError::AlreadyInProgress {
                kind,
                id: id.to_string(),
            });
        }

        let guard = CancelOnDrop {
            registry: &self.registry,
            id,
            armed: true,
        };
        if let Err(e) = trigger(id.to_string()).await {
            drop(guard);
            self.observability.error(Component::DeleteCoordinator);
            warn!(%kind, id, error = %e, "Deletion request failed before reaching the platform");
            return Ok(DeleteOutcome::RemoteFailure {
                status: None,
                message: Some(e.to_string()),
            });
        }
        guard.disarm();

        let result = self.registry.await_result(id, self.max_wait).await?;
        let outcome = DeleteOutcome::from_callback(result);
        match &outcome {
            DeleteOutcome::Success => {
                let elapsed = self.observability.observe(timer);
                debug!(%kind, id, ?elapsed, "Deletion confirmed");
            }
            DeleteOutcome::RemoteFailure { status, message } => {
                self.observability.error(Component::DeleteCoordinator);
                warn!(%kind, id, ?status, ?message, "Platform reported a failed deletion");
            }
            DeleteOutcome::Timeout => {
                self.observability.error(Component::DeleteCoordinator);
                warn!(%kind, id, max_wait = ?self.max_wait, "No deletion callback within the wait bound");
            }
        }
        Ok(outcome)
    }

    /// Inbound completion notification for `id`.
    pub fn callback(&self, id: &str, result: DeleteOperationResult) {
        self.registry.callback(id, result);
    }
}

/// wait への受け渡し前に抜けたら登録を取り消す
struct CancelOnDrop<'a> {
    registry: &'a CorrelationRegistry,
    id: &'a str,
    armed: bool,
}

impl CancelOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.cancel(self.id);
        }
    }
}
