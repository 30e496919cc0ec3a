//! DeferredScheduler - phase ごとの FIFO キュー
//!
//! # 実装詳細
//! - deferred phase（Update / LateUpdate / FixedUpdate）ごとに `VecDeque` を 1 本
//! - `enqueue` は末尾に追加、`pop` は先頭から取り出す（取り出した時点で消費）
//! - ある phase に積んだものはその phase の drain でしか取り出されない
//!
//! # Drain budget
//! 1 回の drain が処理できる量の上限（件数 / 経過時間）。
//! 判定は次の 1 件を取り出す**前**に行うので、実行中のハンドラが
//! 中断されることはありません。予算切れで残ったものは次回に回るだけで、
//! 捨てられることはありません。

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Envelope, Phase};
use crate::error::BusError;

/// Cap on how much work one drain call may absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainBudget {
    pub max_count: Option<usize>,
    pub max_millis: Option<u64>,
}

impl DrainBudget {
    pub const UNLIMITED: DrainBudget = DrainBudget {
        max_count: None,
        max_millis: None,
    };

    pub fn count(max_count: usize) -> Self {
        Self {
            max_count: Some(max_count),
            max_millis: None,
        }
    }

    pub fn millis(max_millis: u64) -> Self {
        Self {
            max_count: None,
            max_millis: Some(max_millis),
        }
    }

    pub fn with_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn with_millis(mut self, max_millis: u64) -> Self {
        self.max_millis = Some(max_millis);
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_count.is_none() && self.max_millis.is_none()
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_millis.map(Duration::from_millis)
    }
}

/// Which budget stopped a drain early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLimit {
    Count,
    Time,
}

/// Running account of one drain call against its budget.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budget: DrainBudget,
    started_at: DateTime<Utc>,
    processed: usize,
}

impl BudgetTracker {
    pub fn start(budget: DrainBudget, now: DateTime<Utc>) -> Self {
        Self {
            budget,
            started_at: now,
            processed: 0,
        }
    }

    /// Checked before taking the next item.
    pub fn exhausted(&self, now: DateTime<Utc>) -> Option<BudgetLimit> {
        if let Some(max_elapsed) = self.budget.max_elapsed() {
            // A clock that stepped backwards counts as no time spent.
            let elapsed = (now - self.started_at).to_std().unwrap_or_default();
            if elapsed > max_elapsed {
                return Some(BudgetLimit::Time);
            }
        }
        if self
            .budget
            .max_count
            .is_some_and(|max_count| self.processed >= max_count)
        {
            return Some(BudgetLimit::Count);
        }
        None
    }

    pub fn record(&mut self) {
        self.processed += 1;
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}

/// Outcome of one drain call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub phase: Phase,
    pub processed: usize,
    pub remaining: usize,
    pub stopped_by: Option<BudgetLimit>,
}

impl DrainReport {
    pub fn empty(phase: Phase, remaining: usize) -> Self {
        Self {
            phase,
            processed: 0,
            remaining,
            stopped_by: None,
        }
    }
}

/// One FIFO queue per deferred phase.
#[derive(Default)]
pub struct DeferredScheduler {
    queues: [VecDeque<Envelope>; 3],
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(phase: Phase) -> Result<usize, BusError> {
        phase.deferred_slot().ok_or(BusError::UnknownPhase(phase))
    }

    /// Appends `envelope` to the queue of `phase`.
    pub fn enqueue(&mut self, phase: Phase, envelope: Envelope) -> Result<(), BusError> {
        let slot = Self::slot(phase)?;
        self.queues[slot].push_back(envelope);
        Ok(())
    }

    /// Removes and returns the head of the queue of `phase`.
    pub fn pop(&mut self, phase: Phase) -> Option<Envelope> {
        let slot = phase.deferred_slot()?;
        self.queues[slot].pop_front()
    }

    pub fn len(&self, phase: Phase) -> usize {
        phase
            .deferred_slot()
            .map_or(0, |slot| self.queues[slot].len())
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Pending counts ordered as [`Phase::DEFERRED`].
    pub fn len_per_phase(&self) -> [usize; 3] {
        [
            self.queues[0].len(),
            self.queues[1].len(),
            self.queues[2].len(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::fixtures::Staged;
    use chrono::{TimeDelta, TimeZone};
    use rstest::rstest;

    fn staged(seq: u32, phase: Phase) -> Envelope {
        Envelope::new(Staged::new(seq, phase))
    }

    fn seq_of(envelope: &Envelope) -> u32 {
        envelope.downcast_ref::<Staged>().map(|s| s.seq).unwrap()
    }

    #[test]
    fn immediate_phase_has_no_queue() {
        let mut scheduler = DeferredScheduler::new();

        let err = scheduler
            .enqueue(Phase::Immediate, staged(1, Phase::Immediate))
            .unwrap_err();

        assert!(matches!(err, BusError::UnknownPhase(Phase::Immediate)));
        assert!(scheduler.is_empty());
        assert!(scheduler.pop(Phase::Immediate).is_none());
    }

    #[rstest]
    #[case(Phase::Update)]
    #[case(Phase::LateUpdate)]
    #[case(Phase::FixedUpdate)]
    fn queues_are_fifo_and_isolated(#[case] phase: Phase) {
        let mut scheduler = DeferredScheduler::new();
        for seq in 0..3 {
            scheduler.enqueue(phase, staged(seq, phase)).unwrap();
        }

        for other in Phase::DEFERRED.into_iter().filter(|p| *p != phase) {
            assert_eq!(scheduler.len(other), 0);
            assert!(scheduler.pop(other).is_none());
        }

        let order: Vec<u32> = std::iter::from_fn(|| scheduler.pop(phase))
            .map(|e| seq_of(&e))
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn len_per_phase_counts_each_queue() {
        let mut scheduler = DeferredScheduler::new();
        scheduler.enqueue(Phase::Update, staged(0, Phase::Update)).unwrap();
        scheduler.enqueue(Phase::Update, staged(1, Phase::Update)).unwrap();
        scheduler
            .enqueue(Phase::FixedUpdate, staged(2, Phase::FixedUpdate))
            .unwrap();

        assert_eq!(scheduler.len_per_phase(), [2, 0, 1]);
    }

    #[test]
    fn count_budget_stops_after_max_items() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut tracker = BudgetTracker::start(DrainBudget::count(2), now);

        assert_eq!(tracker.exhausted(now), None);
        tracker.record();
        assert_eq!(tracker.exhausted(now), None);
        tracker.record();
        assert_eq!(tracker.exhausted(now), Some(BudgetLimit::Count));
        assert_eq!(tracker.processed(), 2);
    }

    #[test]
    fn time_budget_trips_only_once_exceeded() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let tracker = BudgetTracker::start(DrainBudget::millis(10), now);

        assert_eq!(tracker.exhausted(now + TimeDelta::milliseconds(10)), None);
        assert_eq!(
            tracker.exhausted(now + TimeDelta::milliseconds(11)),
            Some(BudgetLimit::Time)
        );
        // Clock stepping backwards is treated as zero elapsed.
        assert_eq!(tracker.exhausted(now - TimeDelta::seconds(5)), None);
    }

    #[test]
    fn unlimited_budget_never_trips() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut tracker = BudgetTracker::start(DrainBudget::UNLIMITED, now);
        for _ in 0..1000 {
            tracker.record();
        }
        assert_eq!(tracker.exhausted(now + TimeDelta::hours(1)), None);
        assert!(DrainBudget::default().is_unlimited());
    }

    #[test]
    fn budget_reads_from_partial_json() {
        let budget: DrainBudget = serde_json::from_str(r#"{ "max_count": 3 }"#).unwrap();
        assert_eq!(budget, DrainBudget::count(3));
        assert_eq!(
            DrainBudget::count(3).with_millis(5).max_elapsed(),
            Some(Duration::from_millis(5))
        );
    }
}
