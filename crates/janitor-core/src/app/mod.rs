//! App - アプリケーション層
//!
//! コンポーネントを組み合わせて常駐ジョブとして動かします。
//!
//! # 主要コンポーネント
//! - **Scheduler**: cleanup サイクルと検証の定期実行

pub mod scheduler;

pub use self::scheduler::Scheduler;
