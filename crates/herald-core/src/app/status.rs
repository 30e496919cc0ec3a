//! Status - バスの状態スナップショット
//!
//! `Bus::status()` が返す、シリアライズ可能な集計値です。

use serde::Serialize;

use crate::domain::{MessageType, Phase};

/// Pending messages per deferred phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounts {
    pub update: usize,
    pub late_update: usize,
    pub fixed_update: usize,
}

impl PhaseCounts {
    /// Builds from counts ordered as [`Phase::DEFERRED`].
    pub fn from_slots([update, late_update, fixed_update]: [usize; 3]) -> Self {
        Self {
            update,
            late_update,
            fixed_update,
        }
    }

    pub fn get(&self, phase: Phase) -> usize {
        match phase {
            Phase::Immediate => 0,
            Phase::Update => self.update,
            Phase::LateUpdate => self.late_update,
            Phase::FixedUpdate => self.fixed_update,
        }
    }

    pub fn total(&self) -> usize {
        self.update + self.late_update + self.fixed_update
    }
}

/// Running totals since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub emitted: u64,
    pub dispatched: u64,
    pub handler_calls: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStatus {
    pub pending: PhaseCounts,
    pub typed_handlers: usize,
    pub wildcard_handlers: usize,
    pub observers: usize,
    pub declared_types: Vec<MessageType>,
    pub totals: DeliveryCounts,
}
