//! App - アプリケーション層
//!
//! ports と impls を組み合わせてバス本体を構成します。
//!
//! # 主要コンポーネント
//! - **Bus**: 登録・emit・drain の窓口（`Bus::main()` / private bus）
//! - **Dispatcher**: 1 通を typed → wildcard の順に配り、失敗を observer へ
//! - **BusBuilder / BusConfig**: 構築と設定（drain budget, tick 周期）
//! - **Driver**: TickSource に合わせて phase を drain するループ
//! - **BusStatus**: 状態スナップショット

pub mod builder;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod status;

pub use self::builder::BusBuilder;
pub use self::bus::{Bus, EmitSelf, Subscription};
pub use self::config::{BusConfig, PhaseBudgets, TickConfig};
pub use self::dispatcher::{DispatchOutcome, Dispatcher};
pub use self::driver::{Driver, DriverStats};
pub use self::status::{BusStatus, DeliveryCounts, PhaseCounts};
