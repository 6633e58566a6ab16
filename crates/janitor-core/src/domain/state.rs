//! VerificationState - 1 ビルド分の検証状態

use serde::{Deserialize, Serialize};

/// ビルド出力検証のステートマシン
///
/// 状態遷移:
/// - Unflagged -> Verified (checksums match)
/// - Unflagged -> MismatchRetrying(1) -> ... -> MismatchRetrying(max)
/// - MismatchRetrying(n) -> Verified (a later comparison matches)
/// - MismatchRetrying(max) -> Failed (one more mismatch)
///
/// `Verified` と `Failed` はビルドプラットフォーム側にフラグが書かれ、
/// 以降は未検証一覧に出てこなくなる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    Unflagged,
    Verified,
    MismatchRetrying(u32),
    Failed,
}

impl VerificationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, VerificationState::Verified | VerificationState::Failed)
    }
}
