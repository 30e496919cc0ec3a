//! Handler trait - メッセージを受け取るハンドラの定義
//!
//! # 二層構造
//! - **Handler<T>**: 型付きの入口。`T` しか受け取れない
//! - **DynHandler**: object-safe な狭いインターフェース（`accepts` / `invoke`）
//!
//! `TypedHandler<T, H>` が `Handler<T>` を `DynHandler` に変換します（type erasure）。
//! レジストリは `Weak<dyn DynHandler>` だけを保持します。

use std::any::type_name;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::domain::{Envelope, HandlerError, Message, MessageType};

/// Handler は型 `T` のメッセージを処理する
///
/// # 使用例
/// ```ignore
/// struct SetColor { color: Cell<Color> }
///
/// impl Handler<ChangeColor> for SetColor {
///     fn handle(&self, msg: &ChangeColor, _: &Envelope) -> Result<(), HandlerError> {
///         self.color.set(msg.color);
///         Ok(())
///     }
/// }
/// ```
///
/// 状態を変えたい場合は `Cell` / `RefCell` を使います（バスは単一スレッド前提）。
pub trait Handler<T: Message> {
    fn handle(&self, message: &T, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// DynHandler は型消去されたハンドラ
///
/// - `accepts`: この型タグのメッセージを処理できるか
/// - `invoke`: 処理する（受け付けない型なら何もしない）
pub trait DynHandler {
    fn accepts(&self, message_type: MessageType) -> bool;

    fn invoke(&self, envelope: &Envelope) -> Result<(), HandlerError>;

    /// Label used in failure reports and logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

pub struct TypedHandler<T, H> {
    handler: H,
    name: Option<&'static str>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Message, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            name: None,
            _marker: PhantomData,
        }
    }

    pub fn named(name: &'static str, handler: H) -> Self {
        Self {
            handler,
            name: Some(name),
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &H {
        &self.handler
    }
}

impl<T: Message, H: Handler<T> + 'static> TypedHandler<T, H> {
    /// Erases the handler into the shared form used by `Bus::register`.
    pub fn shared(handler: H) -> Rc<dyn DynHandler> {
        Rc::new(Self::new(handler))
    }
}

impl<T: Message, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    fn accepts(&self, message_type: MessageType) -> bool {
        message_type == T::TYPE
    }

    fn invoke(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        match envelope.downcast_ref::<T>() {
            Some(message) => self.handler.handle(message, envelope),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        self.name.unwrap_or_else(type_name::<H>)
    }
}

/// Closure adapter for [`Handler`].
pub struct FnHandler<T, F>(F, PhantomData<fn(&T)>);

impl<T, F> Handler<T> for FnHandler<T, F>
where
    T: Message,
    F: Fn(&T, &Envelope) -> Result<(), HandlerError>,
{
    fn handle(&self, message: &T, envelope: &Envelope) -> Result<(), HandlerError> {
        (self.0)(message, envelope)
    }
}

pub fn handler_fn<T, F>(f: F) -> FnHandler<T, F>
where
    T: Message,
    F: Fn(&T, &Envelope) -> Result<(), HandlerError>,
{
    FnHandler(f, PhantomData)
}

/// Wildcard closure handler: accepts every message type.
pub struct AnyFn<F> {
    f: F,
    name: &'static str,
}

impl<F> DynHandler for AnyFn<F>
where
    F: Fn(&Envelope) -> Result<(), HandlerError>,
{
    fn accepts(&self, _message_type: MessageType) -> bool {
        true
    }

    fn invoke(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        (self.f)(envelope)
    }

    fn name(&self) -> &str {
        self.name
    }
}

pub fn any_fn<F>(f: F) -> AnyFn<F>
where
    F: Fn(&Envelope) -> Result<(), HandlerError>,
{
    AnyFn { f, name: "any_fn" }
}

impl<F> AnyFn<F> {
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}
