//! TickSource port - deferred phase を drain するタイミングの供給元
//!
//! バス自身はループを持ちません。ゲームエンジンのフレームコールバックや
//! tokio の interval など、外部のスケジューラが「どの phase を今 drain するか」を
//! 順に返します。
//!
//! # 契約
//! - `Phase::Immediate` は返さない（キューが存在しない）
//! - 同じ phase の drain は並行に呼ばれない（Driver が逐次に消費する）

use async_trait::async_trait;

use crate::domain::Phase;

/// TickSource は次に drain すべき phase を返す
///
/// `None` はソースの終了（Driver のループを抜ける）を意味します。
#[async_trait(?Send)]
pub trait TickSource {
    async fn next_tick(&mut self) -> Option<Phase>;
}
