//! Ports - 外部との境界（抽象化レイヤー）
//!
//! 外部の協調先ごとに trait を 1 つ定義します。
//! - **RemoteEntitySource**: ビルドプラットフォーム（期限切れの列挙・削除要求）
//! - **BuildRecordSource / LogStore**: 検証用のビルドレコードとログストア
//! - **Clock**: 現在時刻

pub mod clock;
pub mod entity_source;
pub mod verification;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::entity_source::RemoteEntitySource;
pub use self::verification::{BUILD_OUTPUT_OK_KEY, BuildRecordSource, LogStore};
