//! Ports - 抽象化レイヤー
//!
//! バスの外側にあるもの（時刻、ID、失敗の通知先、tick の供給元）への
//! インターフェースを定義します。

pub mod clock;
pub mod error_observer;
pub mod id_generator;
pub mod tick_source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::error_observer::ErrorObserver;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::tick_source::TickSource;
