//! CorrelationRegistry - matches asynchronous delete callbacks to waiters.
//!
//! # Protocol
//! 1. `initialize(id)` registers a pending operation
//! 2. the caller fires the remote request
//! 3. `await_result(id, max_wait)` blocks until `callback(id, ..)` or the bound
//!
//! pending operation ごとに oneshot channel を持ちます。
//! 1 と 3 の間に届いた callback は、waiter が取りに来るまで channel に残ります。
//! map は dashmap でシャード化されており、別 ID 同士は同じロックを取り合いません。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::{Component, DeleteOperationResult, EntityKind, JanitorError, Operation, Result};
use crate::observability::Observability;

/// Registry-owned state of one in-flight operation.
struct PendingOperation {
    /// Distinguishes this registration from a later one under the same id.
    token: u64,
    /// Taken by the first callback.
    sender: Option<oneshot::Sender<DeleteOperationResult>>,
    /// Taken by the (single) waiter.
    receiver: Option<oneshot::Receiver<DeleteOperationResult>>,
}

pub struct CorrelationRegistry {
    kind: EntityKind,
    pending: DashMap<String, PendingOperation>,
    next_token: AtomicU64,
    observability: Arc<Observability>,
}

impl CorrelationRegistry {
    pub fn new(kind: EntityKind, observability: Arc<Observability>) -> Self {
        Self {
            kind,
            pending: DashMap::new(),
            next_token: AtomicU64::new(1),
            observability,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Register a pending operation for `id`.
    ///
    /// Returns false, leaving the existing entry untouched, if `id` is already
    /// pending.
    pub fn initialize(&self, id: &str) -> bool {
        match self.pending.entry(id.to_string()) {
            Entry::Occupied(_) => {
                debug!(kind = %self.kind, id, "Operation already registered");
                false
            }
            Entry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel();
                vacant.insert(PendingOperation {
                    token: self.next_token.fetch_add(1, Ordering::Relaxed),
                    sender: Some(sender),
                    receiver: Some(receiver),
                });
                true
            }
        }
    }

    /// Like [`initialize`](Self::initialize), but a duplicate is an error.
    pub fn register(&self, id: &str) -> Result<()> {
        if self.initialize(id) {
            Ok(())
        } else {
            Err(JanitorError::DuplicateRegistration(id.to_string()))
        }
    }

    /// Deliver the result of operation `id`.
    ///
    /// The first callback wins. Callbacks for unknown, finished or already
    /// answered operations are counted and logged, nothing else.
    pub fn callback(&self, id: &str, result: DeleteOperationResult) {
        // send の前にシャードのガードを外す
        let sender = self
            .pending
            .get_mut(id)
            .and_then(|mut pending| pending.sender.take());

        let Some(sender) = sender else {
            self.observability.warn(Component::CorrelationRegistry);
            warn!(
                kind = %self.kind,
                id,
                "Delete operation callback called for a delete operation, which was not initialized or already answered"
            );
            return;
        };

        if sender.send(result).is_err() {
            // waiter がエントリ削除より先に drop された
            self.observability.warn(Component::CorrelationRegistry);
            warn!(kind = %self.kind, id, "Delete operation callback arrived after the waiter gave up");
        }
    }

    /// Wait up to `max_wait` for the result of operation `id`.
    ///
    /// `Ok(None)` means no result was observed (timeout or cancellation): the
    /// outcome is unknown. The entry is removed when this returns, and also if
    /// the returned future is dropped mid-wait.
    pub async fn await_result(
        &self,
        id: &str,
        max_wait: Duration,
    ) -> Result<Option<DeleteOperationResult>> {
        let (token, receiver) = {
            let Some(mut pending) = self.pending.get_mut(id) else {
                self.observability.error(Component::CorrelationRegistry);
                return Err(JanitorError::UnregisteredOperation(id.to_string()));
            };
            let receiver = pending
                .receiver
                .take()
                .ok_or_else(|| JanitorError::AlreadyAwaiting(id.to_string()))?;
            (pending.token, receiver)
        };
        let _cleanup = RemoveOnDrop {
            pending: &self.pending,
            id,
            token,
        };

        let timer = self.observability.start(Operation::AwaitCallback);
        let result = match tokio::time::timeout(max_wait, receiver).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) => {
                debug!(kind = %self.kind, id, "Operation cancelled while waiting");
                None
            }
            Err(_) => {
                debug!(kind = %self.kind, id, ?max_wait, "No callback within the wait bound");
                None
            }
        };
        self.observability.observe(timer);
        Ok(result)
    }

    /// Drop the pending entry without waiting. A concurrent waiter, if any,
    /// wakes up with no result.
    pub fn cancel(&self, id: &str) {
        if self.pending.remove(id).is_some() {
            debug!(kind = %self.kind, id, "Operation cancelled");
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Removes the awaited entry, but only the registration it was created for.
struct RemoveOnDrop<'a> {
    pending: &'a DashMap<String, PendingOperation>,
    id: &'a str,
    token: u64,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        self.pending
            .remove_if(self.id, |_, pending| pending.token == self.token);
    }
}
