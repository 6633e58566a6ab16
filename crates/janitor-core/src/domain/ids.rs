//! Domain identifiers (strongly-typed IDs).
//!
//! リモートのエンティティはビルドプラットフォームが払い出す文字列 ID で
//! 識別されます。delete callback の相関 ID にも同じ文字列をそのまま使うため、
//! ID 型は文字列を加工せずにラップします。
//!
//! ## Phantom Type パターン
//! `Id<K>` のマーカー型 `K` はコンパイル時にしか存在しません。
//! 実行時はどちらもただの文字列ですが、`GroupBuildId` を期待する場所に
//! `BuildId` を渡すとコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use super::kind::EntityKind;

/// Marker trait for each identifier kind.
pub trait IdMarker: Send + Sync + 'static {
    /// The entity kind this identifier belongs to.
    fn kind() -> EntityKind;
}

/// Generic remote identifier.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<K: IdMarker> {
    raw: String,
    #[serde(skip)]
    _marker: PhantomData<K>,
}

impl<K: IdMarker> Id<K> {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            _marker: PhantomData,
        }
    }

    /// The identifier exactly as the remote system reported it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> EntityKind {
        K::kind()
    }

    pub fn into_inner(self) -> String {
        self.raw
    }
}

// Derived Clone would require `K: Clone`.
impl<K: IdMarker> Clone for Id<K> {
    fn clone(&self) -> Self {
        Self::new(self.raw.clone())
    }
}

impl<K: IdMarker> From<&str> for Id<K> {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<K: IdMarker> From<String> for Id<K> {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl<K: IdMarker> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ========================================
// Marker types
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildMarker {}

impl IdMarker for BuildMarker {
    fn kind() -> EntityKind {
        EntityKind::Build
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupBuildMarker {}

impl IdMarker for GroupBuildMarker {
    fn kind() -> EntityKind {
        EntityKind::GroupBuild
    }
}

/// Identifier of a (temporary) build record.
pub type BuildId = Id<BuildMarker>;

/// Identifier of a (temporary) group build.
pub type GroupBuildId = Id<GroupBuildMarker>;
