//! TickSource の実装
//!
//! - **IntervalTicks**: tokio の interval 2 本（フレーム / 固定ステップ）から tick を作る
//! - **ScriptedTicks**: 決まった phase 列をそのまま返す（テスト・リプレイ用）
//!
//! # フレームの扱い
//! 1 フレームごとに `Update` → `LateUpdate` の順で返します。
//! 固定ステップは独立した周期で `FixedUpdate` を返します。
//! 同時に来た場合は固定ステップを先に返します。

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::domain::Phase;
use crate::ports::TickSource;

fn ticker(period: Duration) -> Interval {
    // tokio rejects a zero period.
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

pub struct IntervalTicks {
    frame: Interval,
    fixed: Interval,
    pending: VecDeque<Phase>,
    frames: u64,
    frame_limit: Option<u64>,
}

impl IntervalTicks {
    pub fn new(frame_period: Duration, fixed_period: Duration) -> Self {
        Self {
            frame: ticker(frame_period),
            fixed: ticker(fixed_period),
            pending: VecDeque::with_capacity(1),
            frames: 0,
            frame_limit: None,
        }
    }

    /// Ends the source once `frames` frames have been produced.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Frames started so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn limit_reached(&self) -> bool {
        self.frame_limit.is_some_and(|limit| self.frames >= limit)
    }
}

#[async_trait(?Send)]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Option<Phase> {
        if let Some(phase) = self.pending.pop_front() {
            return Some(phase);
        }
        if self.limit_reached() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.fixed.tick() => Some(Phase::FixedUpdate),
            _ = self.frame.tick() => {
                self.frames += 1;
                self.pending.push_back(Phase::LateUpdate);
                Some(Phase::Update)
            }
        }
    }
}

/// Replays a fixed list of phases, then ends.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTicks {
    script: VecDeque<Phase>,
}

impl ScriptedTicks {
    pub fn new(script: impl IntoIterator<Item = Phase>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// `frames` full frames of `Update`, `LateUpdate`, `FixedUpdate`.
    pub fn frames(frames: usize) -> Self {
        Self::new(std::iter::repeat_n(Phase::DEFERRED, frames).flatten())
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait(?Send)]
impl TickSource for ScriptedTicks {
    async fn next_tick(&mut self) -> Option<Phase> {
        // Give the driver's shutdown branch a chance between ticks.
        tokio::task::yield_now().await;
        self.script.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(source: &mut impl TickSource) -> Vec<Phase> {
        let mut phases = Vec::new();
        while let Some(phase) = source.next_tick().await {
            phases.push(phase);
        }
        phases
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_interleave_frames_and_fixed_steps() {
        let mut ticks = IntervalTicks::new(Duration::from_millis(16), Duration::from_millis(20))
            .with_frame_limit(2);

        let phases = collect(&mut ticks).await;

        // t=0: both fire, fixed first. t=16: second frame. Limit reached.
        assert_eq!(
            phases,
            vec![
                Phase::FixedUpdate,
                Phase::Update,
                Phase::LateUpdate,
                Phase::Update,
                Phase::LateUpdate,
            ]
        );
        assert_eq!(ticks.frames(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_steps_run_at_their_own_rate() {
        let mut ticks = IntervalTicks::new(Duration::from_millis(100), Duration::from_millis(20))
            .with_frame_limit(2);

        let phases = collect(&mut ticks).await;
        let fixed = phases.iter().filter(|p| **p == Phase::FixedUpdate).count();

        // Fixed steps at 0, 20, 40, 60, 80, 100 before the frame at t=100.
        assert_eq!(fixed, 6);
        assert!(!phases.contains(&Phase::Immediate));
    }

    #[tokio::test]
    async fn zero_frame_limit_ends_immediately() {
        let mut ticks =
            IntervalTicks::new(Duration::from_millis(16), Duration::ZERO).with_frame_limit(0);

        assert_eq!(ticks.next_tick().await, None);
    }

    #[tokio::test]
    async fn scripted_ticks_replay_in_order() {
        let mut ticks = ScriptedTicks::frames(2);
        assert_eq!(ticks.remaining(), 6);

        let phases = collect(&mut ticks).await;

        assert_eq!(
            phases,
            vec![
                Phase::Update,
                Phase::LateUpdate,
                Phase::FixedUpdate,
                Phase::Update,
                Phase::LateUpdate,
                Phase::FixedUpdate,
            ]
        );
        assert_eq!(ticks.next_tick().await, None);
    }
}
