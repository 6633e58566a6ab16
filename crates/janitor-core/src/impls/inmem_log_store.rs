//! InMemoryLogStore - log checksums kept in memory.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::domain::{BuildId, RemoteError};
use crate::ports::LogStore;

/// Each build holds a queue of checksums: every read consumes the front one
/// until only the last remains, which then answers all further reads. A
/// single entry behaves like a plain stored checksum.
#[derive(Default)]
pub struct InMemoryLogStore {
    checksums: Mutex<HashMap<BuildId, VecDeque<String>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_checksum(&self, id: &str, checksum: impl Into<String>) {
        self.set_checksums(id, [checksum.into()]).await;
    }

    /// Answer successive reads for `id` with `checksums` in order.
    pub async fn set_checksums(&self, id: &str, checksums: impl IntoIterator<Item = String>) {
        let queue: VecDeque<String> = checksums.into_iter().collect();
        let mut map = self.checksums.lock().await;
        if queue.is_empty() {
            map.remove(&BuildId::new(id));
        } else {
            map.insert(BuildId::new(id), queue);
        }
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn checksum(&self, id: &BuildId) -> Result<String, RemoteError> {
        let mut map = self.checksums.lock().await;
        let queue = map.get_mut(id).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("no build log for {id}"),
        })?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.ok_or_else(|| RemoteError::Transport(format!("empty checksum queue for {id}")))
    }
}
