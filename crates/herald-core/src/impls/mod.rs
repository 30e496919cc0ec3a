//! Impls - 実装
//!
//! ports の実装と、バスに付随する部品を含めます。
//!
//! # 含まれる実装
//! - **DeferredScheduler**: phase ごとの FIFO キューと drain budget
//! - **IntervalTicks / ScriptedTicks**: TickSource の実装
//! - **TracingSink**: 配送ログを tracing に流す MessageSink

pub mod interval_ticks;
pub mod log_sink;
pub mod phase_queues;

pub use self::interval_ticks::{IntervalTicks, ScriptedTicks};
pub use self::log_sink::{MessageSink, SinkAttachment, TracingSink, attach_sink};
pub use self::phase_queues::{BudgetLimit, BudgetTracker, DeferredScheduler, DrainBudget, DrainReport};
