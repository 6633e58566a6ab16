//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports のインメモリ実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBuildPlatform**: ビルドプラットフォームのシミュレーション
//! - **InMemoryLogStore**: ログのチェックサム
//!
//! 本番のビルドプラットフォーム・ログストア向けアダプタはこのクレートの外に置きます。

pub mod inmem_log_store;
pub mod inmem_platform;

pub use self::inmem_log_store::InMemoryLogStore;
pub use self::inmem_platform::InMemoryBuildPlatform;
