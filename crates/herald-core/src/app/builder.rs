//! BusBuilder - バスの構築
//!
//! # 使用例
//! ```ignore
//! let bus = Bus::builder()
//!     .config(BusConfig::from_path("herald.json")?)
//!     .budget(Phase::FixedUpdate, DrainBudget::millis(4))
//!     .declare::<ChangeColor>()
//!     .build();
//! ```

use std::rc::Rc;

use tracing::warn;

use crate::domain::{Message, MessageType, Phase};
use crate::impls::DrainBudget;
use crate::ports::{Clock, SystemClock};

use super::bus::Bus;
use super::config::BusConfig;

pub struct BusBuilder {
    clock: Option<Rc<dyn Clock>>,
    config: BusConfig,
    declared: Vec<MessageType>,
}

impl BusBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            config: BusConfig::default(),
            declared: Vec::new(),
        }
    }

    /// Clock for CallerInfo timestamps and drain time budgets.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Rc::new(clock));
        self
    }

    /// Replaces the whole configuration, budgets set earlier included.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the drain budget of one deferred phase.
    pub fn budget(mut self, phase: Phase, budget: DrainBudget) -> Self {
        if !self.config.budgets.set(phase, budget) {
            warn!(%phase, "phase has no queue; budget ignored");
        }
        self
    }

    /// Makes `T` known up front, so runtime tokens for it validate.
    pub fn declare<T: Message>(mut self) -> Self {
        if !self.declared.contains(&T::TYPE) {
            self.declared.push(T::TYPE);
        }
        self
    }

    pub fn build(self) -> Bus {
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        Bus::from_parts(clock, self.config, &self.declared)
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
