//! Dispatcher - 1 通のメッセージを登録済みハンドラへ配る
//!
//! # フロー
//! 1. `delivered_at` を記録
//! 2. typed ハンドラを登録順に呼ぶ（いなければ `Typed` 方針の違反を通知）
//! 3. その後で wildcard 一覧を引き、登録順に呼ぶ（いなければ `Wildcard` 方針の違反を通知）
//! 4. どちらもいなければ `Any` 方針の違反を通知
//!
//! # 失敗の隔離
//! - ハンドラの `Err` と panic はどちらも ErrorObserver に通知して次へ進む
//! - ErrorObserver 自身の panic はログに残して握りつぶす
//! - ErrorObserver が 1 つもなければ失敗は `debug` ログだけ
//!
//! # 再入
//! ハンドラ・observer の呼び出し中は RefCell の borrow を一切持ちません。
//! typed 一覧・wildcard 一覧・observer 一覧は、それぞれ呼び出す直前にスナップショットを取ります。
//! `accepts` が false のハンドラはいないものとして扱います。

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::domain::{DispatchFailure, Envelope, MessageType, ObserverId, RequireListener};
use crate::ports::{Clock, ErrorObserver};
use crate::typed::{DynHandler, HandlerRegistry};

pub(crate) type ObserverList = RefCell<Vec<(ObserverId, Rc<dyn ErrorObserver>)>>;

/// What one dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub handlers: usize,
    pub failures: usize,
}

pub struct Dispatcher<'a> {
    registry: &'a RefCell<HandlerRegistry>,
    observers: &'a ObserverList,
    clock: &'a dyn Clock,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(
        registry: &'a RefCell<HandlerRegistry>,
        observers: &'a ObserverList,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            registry,
            observers,
            clock,
        }
    }

    pub fn dispatch(&self, envelope: &mut Envelope) -> DispatchOutcome {
        envelope.mark_delivered(self.clock.now());
        let envelope: &Envelope = envelope;

        let message_type = envelope.message_type();
        let require = envelope.require_listener();
        let typed = if message_type.is_any() {
            Vec::new()
        } else {
            self.lookup(message_type, message_type)
        };

        let mut outcome = DispatchOutcome::default();

        if typed.is_empty() {
            if require == RequireListener::Typed {
                self.report(&DispatchFailure::MissingTypedListener { message_type }, envelope);
                outcome.failures += 1;
            }
        } else {
            self.run_all(&typed, envelope, &mut outcome);
        }

        // Typed handlers may have dropped wildcard subscriptions.
        let wildcard = self.lookup(MessageType::ANY, message_type);
        if wildcard.is_empty() {
            if require == RequireListener::Wildcard {
                self.report(&DispatchFailure::MissingWildcardListener { message_type }, envelope);
                outcome.failures += 1;
            }
        } else {
            self.run_all(&wildcard, envelope, &mut outcome);
        }

        if require == RequireListener::Any && typed.is_empty() && wildcard.is_empty() {
            self.report(&DispatchFailure::MissingAnyListener { message_type }, envelope);
            outcome.failures += 1;
        }

        outcome
    }

    /// Live handlers under `slot` that accept this message's type.
    fn lookup(&self, slot: MessageType, message_type: MessageType) -> Vec<Rc<dyn DynHandler>> {
        let mut handlers = self.registry.borrow_mut().lookup(slot);
        handlers.retain(|handler| handler.accepts(message_type));
        handlers
    }

    fn run_all(
        &self,
        handlers: &[Rc<dyn DynHandler>],
        envelope: &Envelope,
        outcome: &mut DispatchOutcome,
    ) {
        for handler in handlers {
            outcome.handlers += 1;
            if let Some(failure) = self.run_one(handler.as_ref(), envelope) {
                self.report(&failure, envelope);
                outcome.failures += 1;
            }
        }
    }

    fn run_one(&self, handler: &dyn DynHandler, envelope: &Envelope) -> Option<DispatchFailure> {
        trace!(handler = handler.name(), message = %envelope, "delivering");

        match catch_unwind(AssertUnwindSafe(|| handler.invoke(envelope))) {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(DispatchFailure::HandlerFailed {
                handler: handler.name().to_string(),
                error,
            }),
            Err(payload) => Some(DispatchFailure::HandlerPanicked {
                handler: handler.name().to_string(),
                panic: panic_message(payload.as_ref()),
            }),
        }
    }

    fn report(&self, failure: &DispatchFailure, envelope: &Envelope) {
        let observers: Vec<(ObserverId, Rc<dyn ErrorObserver>)> =
            self.observers.borrow().iter().cloned().collect();

        if observers.is_empty() {
            debug!(message = %envelope, %failure, "dispatch failure with no observer attached");
            return;
        }

        for (id, observer) in observers {
            let result = catch_unwind(AssertUnwindSafe(|| observer.on_failure(failure, envelope)));
            if let Err(payload) = result {
                warn!(
                    observer = %id,
                    panic = %panic_message(payload.as_ref()),
                    "error observer panicked"
                );
            }
        }
    }
}
