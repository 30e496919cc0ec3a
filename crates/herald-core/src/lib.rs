//! herald-core
//!
//! In-process publish/subscribe message bus.
//!
//! # モジュール構成
//! - **domain**: メッセージモデル（Message, Phase, RequireListener, Envelope, CallerInfo, 失敗の型）
//! - **typed**: 型付きハンドラ（Handler, DynHandler, HandlerRegistry）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, ErrorObserver, TickSource）
//! - **impls**: 実装（DeferredScheduler, IntervalTicks, TracingSink）
//! - **app**: バス本体（Bus, Dispatcher, BusBuilder, Driver）
//! - **error**: 呼び出し側に返るエラー（BusError, ConfigError）
//!
//! # 使用例
//! ```ignore
//! #[derive(Debug)]
//! struct ChangeColor { color: Color }
//!
//! impl Message for ChangeColor {
//!     const TYPE: MessageType = MessageType::new("demo.change_color");
//! }
//!
//! let bus = Bus::new();
//! let _sub = bus.subscribe::<ChangeColor, _>(handler_fn(|msg: &ChangeColor, _| {
//!     println!("{:?}", msg.color);
//!     Ok(())
//! }));
//!
//! bus.emit(ChangeColor { color: Color::Red });
//! bus.drain(Phase::Update);
//! ```

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Bus, BusBuilder, BusConfig, BusStatus, Driver, EmitSelf, Subscription};
pub use domain::{
    CallerInfo, DispatchFailure, EmissionId, Envelope, HandlerError, Message, MessageType, Phase,
    RequireListener,
};
pub use error::{BusError, ConfigError};
pub use impls::{DrainBudget, DrainReport};
pub use typed::{DynHandler, Handler, TypedHandler, any_fn, handler_fn};
