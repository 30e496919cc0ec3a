//! Clock port - 時刻の抽象化
//!
//! CallerInfo のタイムスタンプと drain の時間予算はすべてこの Clock から取ります。
//!
//! # テスト容易性
//! - trait により時刻を差し替え可能
//! - テストでは FixedClock を使用（`advance` で手動で進める）

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};

/// Clock は現在時刻を提供
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// SystemClock は実時間（本番用）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// FixedClock は手動で進める時計（テスト用）
///
/// 単一スレッド前提なので内部は `Cell` で持ちます。
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_only_moves_when_advanced() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::milliseconds(16));
        assert_eq!(clock.now(), start + TimeDelta::milliseconds(16));
    }

    #[test]
    fn shared_clock_sees_the_same_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Rc::new(FixedClock::new(start));
        let shared: Rc<dyn Clock> = clock.clone();

        clock.advance(TimeDelta::seconds(1));

        assert_eq!(shared.now(), start + TimeDelta::seconds(1));
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(a <= b);
    }
}
