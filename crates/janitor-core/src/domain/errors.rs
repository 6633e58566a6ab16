//! Errors - エラー型と分類
//!
//! 未知・完了済みの operation への callback はここには含めません。
//! ログとカウンタに記録するだけで、呼び出し元には返しません。

use thiserror::Error;

use super::kind::EntityKind;

/// RemoteError はビルドプラットフォーム / ログストア呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote side answered with an error status.
    #[error("remote call failed with status={status}: {message}")]
    Status { status: u16, message: String },

    /// The request did not get an answer (connection, decoding, ...).
    #[error("remote call failed: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum JanitorError {
    /// `register` was called for an id that is still pending.
    #[error("operation {0} is already registered")]
    DuplicateRegistration(String),

    /// `await` was called without a prior `initialize`.
    #[error("await called for operation {0}, which was never initialized")]
    UnregisteredOperation(String),

    /// Another caller is already waiting on this operation.
    #[error("operation {0} is already being awaited")]
    AlreadyAwaiting(String),

    /// A delete for this entity is already in flight.
    #[error("deletion of {kind} {id} is already in progress")]
    AlreadyInProgress { kind: EntityKind, id: String },

    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, JanitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_in_progress_names_kind_and_id() {
        let err = JanitorError::AlreadyInProgress {
            kind: EntityKind::GroupBuild,
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "deletion of group build 42 is already in progress");
    }

    #[test]
    fn remote_error_converts_transparently() {
        let err: JanitorError = RemoteError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "remote call failed with status=503: unavailable");
    }
}
