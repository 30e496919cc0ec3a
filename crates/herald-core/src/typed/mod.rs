//! Typed - 型付きハンドラ API
//!
//! 型タグの typo を型で排除し、Handler と Message の対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Message` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod registry;

pub use self::handler::{AnyFn, DynHandler, FnHandler, Handler, TypedHandler, any_fn, handler_fn};
pub use self::registry::HandlerRegistry;
