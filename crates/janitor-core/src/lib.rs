//! janitor-core
//!
//! ビルド成果物の janitor のコア。リモートのビルドプラットフォームから
//! 期限切れの一時ビルドを削除し、ビルド出力のチェックサムをログストアと照合します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, kind, entity, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（RemoteEntitySource, BuildRecordSource, LogStore, Clock）
//! - **correlation**: 非同期 delete callback と待機側の対応付け
//! - **delete**: 削除して callback を待つ協調処理と callback のルーティング
//! - **cleanup**: 定期 cleanup サイクルと収束ループ
//! - **verify**: リトライ上限付きのチェックサム検証
//! - **observability**: warning/error カウンタと latency の最小・最大
//! - **config**: 実行時設定
//! - **app**: 定期ジョブのスケジューリング
//! - **impls**: ports のインメモリ実装

pub mod app;
pub mod cleanup;
pub mod config;
pub mod correlation;
pub mod delete;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod verify;
