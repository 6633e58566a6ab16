//! Outcome model: what a remote delete reported, and what a caller concludes.
//!
//! `DeleteOperationResult` is the payload the build platform posts to the
//! callback endpoint. `DeleteOutcome` is the coordinator's verdict, which also
//! covers the case where no callback was seen at all.

use serde::{Deserialize, Serialize};

/// Status reported by the build platform for a finished operation.
///
/// Serialized as SCREAMING_SNAKE_CASE to match the platform's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Success,
    Failed,
    Cancelled,
    TimedOut,
    SystemError,
}

impl ResultStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ResultStatus::Success)
    }
}

/// Callback payload of a remote delete operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOperationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeleteOperationResult {
    pub fn success() -> Self {
        Self {
            status: Some(ResultStatus::Success),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(ResultStatus::Failed),
            message: Some(message.into()),
        }
    }

    pub fn with_status(status: ResultStatus) -> Self {
        Self {
            status: Some(status),
            message: None,
        }
    }

    /// A payload without a status never counts as success.
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(ResultStatus::is_success)
    }
}

/// Verdict of a delete-and-await round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteOutcome {
    Success,

    /// The remote side reported a failure, or the request could not be sent.
    RemoteFailure {
        status: Option<ResultStatus>,
        message: Option<String>,
    },

    /// No callback within the bound. Unconfirmed, never treated as success.
    Timeout,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Success)
    }

    /// Classify an awaited callback result. `None` means nothing arrived.
    pub fn from_callback(result: Option<DeleteOperationResult>) -> Self {
        match result {
            None => DeleteOutcome::Timeout,
            Some(result) if result.is_success() => DeleteOutcome::Success,
            Some(result) => DeleteOutcome::RemoteFailure {
                status: result.status,
                message: result.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn result_status_serializes_as_platform_names() {
        let s = serde_json::to_string(&ResultStatus::SystemError).unwrap();
        assert_eq!(s, "\"SYSTEM_ERROR\"");

        let s = serde_json::to_string(&ResultStatus::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");
    }

    #[test]
    fn callback_payload_parses_with_missing_message() {
        let r: DeleteOperationResult = serde_json::from_str(r#"{"status":"SUCCESS"}"#).unwrap();
        assert!(r.is_success());
        assert!(r.message.is_none());

        let r: DeleteOperationResult = serde_json::from_str("{}").unwrap();
        assert!(!r.is_success());
    }

    #[rstest]
    #[case(None, DeleteOutcome::Timeout)]
    #[case(Some(DeleteOperationResult::success()), DeleteOutcome::Success)]
    #[case(
        Some(DeleteOperationResult::failed("in use")),
        DeleteOutcome::RemoteFailure { status: Some(ResultStatus::Failed), message: Some("in use".to_string()) }
    )]
    #[case(
        Some(DeleteOperationResult::default()),
        DeleteOutcome::RemoteFailure { status: None, message: None }
    )]
    fn outcome_from_callback(
        #[case] result: Option<DeleteOperationResult>,
        #[case] expected: DeleteOutcome,
    ) {
        assert_eq!(DeleteOutcome::from_callback(result), expected);
    }

    #[test]
    fn delete_outcome_is_tagged() {
        let v = serde_json::to_value(DeleteOutcome::Timeout).unwrap();
        assert_eq!(v["kind"], "TIMEOUT");
    }
}
