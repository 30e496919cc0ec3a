//! HandlerRegistry - 型タグごとのハンドラ一覧
//!
//! # 内部実装
//! - `HashMap<MessageType, Vec<Weak<dyn DynHandler>>>` で管理
//! - 登録順 = 呼び出し順（優先度はない）
//! - 弱参照なので登録がハンドラを生かし続けることはない
//! - 死んだエントリは `lookup` のついでに取り除く（別途 sweep はしない）
//!
//! # 型タグの検証
//! `declare` 済みの型と予約済みの `MessageType::ANY` 以外への
//! register / deregister は `BusError::InvalidSubscriptionType` になります。
//! 型付きのスロットに、その型を `accepts` しないハンドラを register しても同じエラーです。

use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::domain::MessageType;
use crate::error::BusError;

use super::handler::DynHandler;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageType, Vec<Weak<dyn DynHandler>>>,
    declared: HashSet<MessageType>,
}

fn same_handler(entry: &Weak<dyn DynHandler>, handler: &Rc<dyn DynHandler>) -> bool {
    // Compare allocations only; vtable pointers are not guaranteed unique.
    std::ptr::addr_eq(entry.as_ptr(), Rc::as_ptr(handler))
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message_type` as a known message variant.
    pub fn declare(&mut self, message_type: MessageType) -> Result<(), BusError> {
        if message_type.is_any() {
            return Err(BusError::InvalidSubscriptionType(message_type));
        }
        self.declared.insert(message_type);
        Ok(())
    }

    pub fn is_subscribable(&self, message_type: MessageType) -> bool {
        message_type.is_any() || self.declared.contains(&message_type)
    }

    fn check(&self, message_type: MessageType) -> Result<(), BusError> {
        if self.is_subscribable(message_type) {
            Ok(())
        } else {
            Err(BusError::InvalidSubscriptionType(message_type))
        }
    }

    /// Appends a weak reference to `handler` under `message_type`.
    ///
    /// A typed slot only takes handlers that accept its type.
    pub fn register(
        &mut self,
        message_type: MessageType,
        handler: &Rc<dyn DynHandler>,
    ) -> Result<(), BusError> {
        self.check(message_type)?;
        if !message_type.is_any() && !handler.accepts(message_type) {
            return Err(BusError::InvalidSubscriptionType(message_type));
        }
        self.insert(message_type, handler);
        Ok(())
    }

    /// Declares `message_type` on the fly and registers `handler` under it.
    ///
    /// Used by the typed entry points, whose type tag is known to be valid.
    pub fn register_declaring(&mut self, message_type: MessageType, handler: &Rc<dyn DynHandler>) {
        if !message_type.is_any() {
            self.declared.insert(message_type);
        }
        self.insert(message_type, handler);
    }

    fn insert(&mut self, message_type: MessageType, handler: &Rc<dyn DynHandler>) {
        self.handlers
            .entry(message_type)
            .or_default()
            .push(Rc::downgrade(handler));
    }

    /// Removes every entry pointing at `handler`. Absent handlers are a no-op.
    pub fn deregister(
        &mut self,
        message_type: MessageType,
        handler: &Rc<dyn DynHandler>,
    ) -> Result<(), BusError> {
        self.check(message_type)?;
        self.remove(message_type, handler);
        Ok(())
    }

    /// Unvalidated removal; unknown types simply have nothing to remove.
    pub fn remove(&mut self, message_type: MessageType, handler: &Rc<dyn DynHandler>) {
        if let Some(slot) = self.handlers.get_mut(&message_type) {
            slot.retain(|entry| !same_handler(entry, handler));
        }
    }

    /// Live handlers for `message_type`, in registration order.
    ///
    /// Dead weak references met on the way are removed from the slot.
    pub fn lookup(&mut self, message_type: MessageType) -> Vec<Rc<dyn DynHandler>> {
        let Some(slot) = self.handlers.get_mut(&message_type) else {
            return Vec::new();
        };

        let mut live = Vec::with_capacity(slot.len());
        slot.retain(|entry| match entry.upgrade() {
            Some(handler) => {
                live.push(handler);
                true
            }
            None => false,
        });
        live
    }

    /// Number of live handlers for `message_type`, without pruning.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers
            .get(&message_type)
            .map(|slot| slot.iter().filter(|entry| entry.strong_count() > 0).count())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn slot_len(&self, message_type: MessageType) -> usize {
        self.handlers.get(&message_type).map_or(0, Vec::len)
    }

    /// Types that currently have at least one live handler.
    pub fn registered_types(&self) -> Vec<MessageType> {
        let mut types: Vec<MessageType> = self
            .handlers
            .keys()
            .copied()
            .filter(|ty| self.handler_count(*ty) > 0)
            .collect();
        types.sort();
        types
    }

    /// Live handlers across every typed slot (wildcard slot excluded).
    pub fn typed_handler_count(&self) -> usize {
        self.handlers
            .keys()
            .filter(|ty| !ty.is_any())
            .map(|ty| self.handler_count(*ty))
            .sum()
    }

    pub fn declared_types(&self) -> Vec<MessageType> {
        let mut types: Vec<MessageType> = self.declared.iter().copied().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::fixtures::{Ping, Pong};
    use crate::domain::{Envelope, HandlerError, Message};
    use crate::typed::handler::{TypedHandler, any_fn, handler_fn};

    fn ping_handler() -> Rc<dyn DynHandler> {
        TypedHandler::<Ping, _>::shared(handler_fn(|_: &Ping, _| Ok(())))
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.declare(Ping::TYPE).unwrap();
        registry.declare(Pong::TYPE).unwrap();
        registry
    }

    #[test]
    fn register_and_lookup_preserves_order() {
        let mut registry = registry();
        let first = ping_handler();
        let second = ping_handler();

        registry.register(Ping::TYPE, &first).unwrap();
        registry.register(Ping::TYPE, &second).unwrap();

        let found = registry.lookup(Ping::TYPE);
        assert_eq!(found.len(), 2);
        assert!(Rc::ptr_eq(&found[0], &first));
        assert!(Rc::ptr_eq(&found[1], &second));
        assert!(registry.lookup(Pong::TYPE).is_empty());
    }

    #[test]
    fn undeclared_types_are_rejected() {
        let mut registry = HandlerRegistry::new();
        let handler = ping_handler();

        let err = registry.register(Ping::TYPE, &handler).unwrap_err();
        assert!(matches!(err, BusError::InvalidSubscriptionType(ty) if ty == Ping::TYPE));

        let err = registry.deregister(Ping::TYPE, &handler).unwrap_err();
        assert!(matches!(err, BusError::InvalidSubscriptionType(_)));
    }

    #[test]
    fn typed_slot_rejects_a_handler_for_another_type() {
        let mut registry = registry();
        let pong = TypedHandler::<Pong, _>::shared(handler_fn(|_: &Pong, _| Ok(())));

        let err = registry.register(Ping::TYPE, &pong).unwrap_err();
        assert!(matches!(err, BusError::InvalidSubscriptionType(ty) if ty == Ping::TYPE));
        assert_eq!(registry.handler_count(Ping::TYPE), 0);

        // The wildcard slot takes any handler.
        registry.register(MessageType::ANY, &pong).unwrap();
    }

    #[test]
    fn any_is_always_subscribable_but_cannot_be_declared() {
        let mut registry = HandlerRegistry::new();
        let sink: Rc<dyn DynHandler> = Rc::new(any_fn(|_: &Envelope| Ok::<(), HandlerError>(())));

        registry.register(MessageType::ANY, &sink).unwrap();
        assert_eq!(registry.lookup(MessageType::ANY).len(), 1);
        assert!(registry.declare(MessageType::ANY).is_err());
    }

    #[test]
    fn deregister_removes_by_identity() {
        let mut registry = registry();
        let keep = ping_handler();
        let drop_me = ping_handler();

        registry.register(Ping::TYPE, &keep).unwrap();
        registry.register(Ping::TYPE, &drop_me).unwrap();
        registry.deregister(Ping::TYPE, &drop_me).unwrap();

        let found = registry.lookup(Ping::TYPE);
        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0], &keep));
    }

    #[test]
    fn deregister_absent_handler_is_a_no_op() {
        let mut registry = registry();
        let registered = ping_handler();
        let stranger = ping_handler();

        registry.register(Ping::TYPE, &registered).unwrap();
        registry.deregister(Ping::TYPE, &stranger).unwrap();
        registry.deregister(Pong::TYPE, &stranger).unwrap();

        assert_eq!(registry.handler_count(Ping::TYPE), 1);
    }

    #[test]
    fn lookup_prunes_dead_handlers() {
        let mut registry = registry();
        let alive = ping_handler();
        let dead = ping_handler();

        registry.register(Ping::TYPE, &dead).unwrap();
        registry.register(Ping::TYPE, &alive).unwrap();
        drop(dead);

        // The dead entry is still stored until the next lookup.
        assert_eq!(registry.slot_len(Ping::TYPE), 2);
        assert_eq!(registry.handler_count(Ping::TYPE), 1);

        let found = registry.lookup(Ping::TYPE);
        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0], &alive));
        assert_eq!(registry.slot_len(Ping::TYPE), 1);
    }

    #[test]
    fn register_declaring_makes_the_type_known() {
        let mut registry = HandlerRegistry::new();
        let handler = ping_handler();

        registry.register_declaring(Ping::TYPE, &handler);

        assert!(registry.is_subscribable(Ping::TYPE));
        assert_eq!(registry.typed_handler_count(), 1);
        assert!(registry.declared_types().contains(&Ping::TYPE));
    }

    #[test]
    fn registered_types_only_lists_live_slots() {
        let mut registry = registry();
        let ping = ping_handler();
        let pong = TypedHandler::<Pong, _>::shared(handler_fn(|_: &Pong, _| Ok(())));

        registry.register(Ping::TYPE, &ping).unwrap();
        registry.register(Pong::TYPE, &pong).unwrap();
        drop(pong);

        assert_eq!(registry.registered_types(), vec![Ping::TYPE]);
        assert_eq!(registry.declared_types(), vec![Ping::TYPE, Pong::TYPE]);
    }
}
