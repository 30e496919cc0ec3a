//! Bus identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型付けしています。
//!
//! ## 用途
//! - **EmissionId**: emit 1 回ごとに振られる ID（ログで queued/delivered を突き合わせる）
//! - **SubscriptionId**: `Subscription` ハンドルの ID
//! - **ObserverId**: ErrorObserver の登録 ID（remove のキー）
//!
//! `Id<T>` の `T` は実行時には使わないマーカー型なので、
//! `EmissionId` と `ObserverId` を取り違えるとコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"emit-", "sub-", "obs-"）を提供します。
pub trait IdMarker: 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emission {}

impl IdMarker for Emission {
    fn prefix() -> &'static str {
        "emit-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subscription {}

impl IdMarker for Subscription {
    fn prefix() -> &'static str {
        "sub-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Observer {}

impl IdMarker for Observer {
    fn prefix() -> &'static str {
        "obs-"
    }
}

/// Identifier of one `emit` call (shared by the queued and delivered record).
pub type EmissionId = Id<Emission>;

/// Identifier of a scoped handler subscription.
pub type SubscriptionId = Id<Subscription>;

/// Identifier of a registered error observer.
pub type ObserverId = Id<Observer>;
