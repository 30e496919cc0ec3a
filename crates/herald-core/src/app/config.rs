//! BusConfig - バスの設定
//!
//! JSON で読み書きできます。省略したキューは既定値（予算無制限）になります。
//!
//! ```json
//! {
//!   "budgets": {
//!     "update": { "max_count": 100 },
//!     "fixed_update": { "max_millis": 4 }
//!   },
//!   "ticks": { "frame_ms": 16, "fixed_ms": 20 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Phase;
use crate::error::ConfigError;
use crate::impls::DrainBudget;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub budgets: PhaseBudgets,
    pub ticks: TickConfig,
}

impl BusConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

/// One drain budget per deferred phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseBudgets {
    pub update: DrainBudget,
    pub late_update: DrainBudget,
    pub fixed_update: DrainBudget,
}

impl PhaseBudgets {
    /// `Immediate` has no queue and therefore no budget; it reads as unlimited.
    pub fn get(&self, phase: Phase) -> DrainBudget {
        match phase {
            Phase::Immediate => DrainBudget::UNLIMITED,
            Phase::Update => self.update,
            Phase::LateUpdate => self.late_update,
            Phase::FixedUpdate => self.fixed_update,
        }
    }

    /// Returns `false` (and changes nothing) for `Immediate`.
    pub fn set(&mut self, phase: Phase, budget: DrainBudget) -> bool {
        let slot = match phase {
            Phase::Immediate => return false,
            Phase::Update => &mut self.update,
            Phase::LateUpdate => &mut self.late_update,
            Phase::FixedUpdate => &mut self.fixed_update,
        };
        *slot = budget;
        true
    }
}

/// Periods used by `IntervalTicks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub frame_ms: u64,
    pub fixed_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            frame_ms: 16,
            fixed_ms: 20,
        }
    }
}

impl TickConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    pub fn fixed_period(&self) -> Duration {
        Duration::from_millis(self.fixed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn empty_json_gives_defaults() {
        let config = BusConfig::from_json_str("{}").unwrap();

        assert_eq!(config, BusConfig::default());
        assert!(config.budgets.get(Phase::Update).is_unlimited());
        assert_eq!(config.ticks.frame_period(), Duration::from_millis(16));
        assert_eq!(config.ticks.fixed_period(), Duration::from_millis(20));
    }

    #[test]
    fn partial_budgets_are_filled_in() {
        let config = BusConfig::from_json_str(
            r#"{
                "budgets": {
                    "update": { "max_count": 100 },
                    "fixed_update": { "max_millis": 4 }
                },
                "ticks": { "frame_ms": 33 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.budgets.get(Phase::Update), DrainBudget::count(100));
        assert_eq!(config.budgets.get(Phase::LateUpdate), DrainBudget::UNLIMITED);
        assert_eq!(config.budgets.get(Phase::FixedUpdate), DrainBudget::millis(4));
        assert_eq!(config.ticks.frame_ms, 33);
        assert_eq!(config.ticks.fixed_ms, 20);
    }

    #[rstest]
    #[case(Phase::Update, true)]
    #[case(Phase::LateUpdate, true)]
    #[case(Phase::FixedUpdate, true)]
    #[case(Phase::Immediate, false)]
    fn set_budget_per_phase(#[case] phase: Phase, #[case] accepted: bool) {
        let mut budgets = PhaseBudgets::default();

        assert_eq!(budgets.set(phase, DrainBudget::count(1)), accepted);
        assert_eq!(budgets.get(phase) == DrainBudget::count(1), accepted);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = BusConfig::from_json_str(r#"{ "budgets": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BusConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("here.json")));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("herald-config-{}.json", ulid::Ulid::new()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "budgets": {{ "late_update": {{ "max_count": 2 }} }} }}"#).unwrap();
        drop(file);

        let config = BusConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.budgets.late_update, DrainBudget::count(2));
    }
}
