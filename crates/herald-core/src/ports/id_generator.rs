//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + 乱数で ULID を生成

use crate::domain::ids::{EmissionId, ObserverId, SubscriptionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はバスが使う ID を生成
pub trait IdGenerator {
    fn generate_emission_id(&self) -> EmissionId;

    fn generate_subscription_id(&self) -> SubscriptionId;

    fn generate_observer_id(&self) -> ObserverId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って時刻部分を作るので、FixedClock を渡せば
/// timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_emission_id(&self) -> EmissionId {
        EmissionId::from(self.next_ulid())
    }

    fn generate_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::from(self.next_ulid())
    }

    fn generate_observer_id(&self) -> ObserverId {
        ObserverId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_emission_id();
        let id2 = id_gen.generate_emission_id();

        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_is_deterministic() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_observer_id();
        let id2 = id_gen.generate_observer_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }

    #[test]
    fn different_id_types_are_generated() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_emission_id().to_string().starts_with("emit-"));
        assert!(id_gen.generate_subscription_id().to_string().starts_with("sub-"));
        assert!(id_gen.generate_observer_id().to_string().starts_with("obs-"));
    }
}
