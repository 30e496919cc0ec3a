//! Driver - TickSource から tick を受け取り、その phase を drain するループ
//!
//! # フロー
//! 1. shutdown が来ていたら抜ける
//! 2. `next_tick()` を shutdown と競合させて待つ
//! 3. hook があれば `(phase, &bus)` で呼ぶ（フレームごとの処理・emit 用）
//! 4. `bus.drain(phase)`（設定された budget で）
//!
//! # shutdown
//! `watch::Sender` に `true` を送るか、Sender を drop すると止まります。
//! drain の途中では止まりません（次の tick を待つところで判定）。
//!
//! Bus が `!Send` なので `tokio::spawn` ではなく、その場で `.await` するか
//! `LocalSet` 上で動かします。

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::Phase;
use crate::impls::DrainReport;
use crate::ports::TickSource;

use super::bus::Bus;
use super::status::PhaseCounts;

type TickHook = Box<dyn FnMut(Phase, &Bus)>;

/// Totals of one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub ticks: u64,
    pub processed: PhaseCounts,
    pub budget_stops: u64,
}

impl DriverStats {
    fn record(&mut self, report: &DrainReport) {
        self.ticks += 1;
        let slot = match report.phase {
            Phase::Immediate => return,
            Phase::Update => &mut self.processed.update,
            Phase::LateUpdate => &mut self.processed.late_update,
            Phase::FixedUpdate => &mut self.processed.fixed_update,
        };
        *slot += report.processed;
        if report.stopped_by.is_some() {
            self.budget_stops += 1;
        }
    }
}

pub struct Driver<S> {
    bus: Bus,
    source: S,
    hook: Option<TickHook>,
}

impl<S: TickSource> Driver<S> {
    pub fn new(bus: Bus, source: S) -> Self {
        Self {
            bus,
            source,
            hook: None,
        }
    }

    /// Runs before each drain with the phase about to be drained.
    pub fn with_hook(mut self, hook: impl FnMut(Phase, &Bus) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs until the source ends or shutdown is requested.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DriverStats {
        let mut stats = DriverStats::default();

        loop {
            if *shutdown.borrow() {
                debug!("driver shutdown requested");
                break;
            }

            let tick = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                    continue;
                }
                tick = self.source.next_tick() => tick,
            };

            let Some(phase) = tick else {
                debug!("tick source ended");
                break;
            };

            if let Some(hook) = self.hook.as_mut() {
                hook(phase, &self.bus);
            }
            let report = self.bus.drain(phase);
            stats.record(&report);
        }

        stats
    }

    /// Runs until the source ends.
    pub async fn run_to_end(self) -> DriverStats {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run(shutdown_rx).await
    }
}
