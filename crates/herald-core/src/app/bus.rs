//! Bus - ハンドラ登録・emit・drain をまとめる窓口
//!
//! # 設計
//! - `Bus` は `Rc<BusInner>` の軽いハンドル（clone しても同じバス）
//! - 単一スレッド前提（`!Send`）。内部状態は `RefCell` / `Cell`
//! - ハンドラ・observer を呼んでいる間は borrow を持たないので、
//!   ハンドラの中から emit / subscribe / drop しても壊れない
//!
//! # 既定インスタンス
//! `Bus::main()` はスレッドごとに 1 つ、最初のアクセスで作られます。
//! `Bus::new()` / `BusBuilder` で作ったバスは `main` と状態を共有しません。
//!
//! # 登録の 2 通り
//! - `subscribe` 系: `Subscription` がハンドラを所有し、drop で登録解除
//! - `register` 系: 呼び出し側がハンドラを所有。バスは弱参照だけを持つ

use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::domain::{
    CallerInfo, EmissionId, Envelope, Message, MessageType, ObserverId, Phase, SubscriptionId,
};
use crate::error::BusError;
use crate::impls::{BudgetTracker, DeferredScheduler, DrainBudget, DrainReport};
use crate::ports::{Clock, ErrorObserver, IdGenerator, UlidGenerator};
use crate::typed::{DynHandler, Handler, HandlerRegistry, TypedHandler};

use super::builder::BusBuilder;
use super::config::BusConfig;
use super::dispatcher::{DispatchOutcome, Dispatcher, ObserverList};
use super::status::{BusStatus, DeliveryCounts, PhaseCounts};

thread_local! {
    static MAIN: Bus = Bus::new();
}

pub(crate) struct BusInner {
    registry: RefCell<HandlerRegistry>,
    scheduler: RefCell<DeferredScheduler>,
    observers: ObserverList,
    clock: Rc<dyn Clock>,
    ids: UlidGenerator<Rc<dyn Clock>>,
    config: BusConfig,
    draining: Cell<[bool; 3]>,
    totals: Cell<DeliveryCounts>,
}

/// Handle to one message bus.
#[derive(Clone)]
pub struct Bus {
    inner: Rc<BusInner>,
}

/// Clears the in-progress flag of a phase when the drain ends.
struct DrainGuard<'a> {
    draining: &'a Cell<[bool; 3]>,
    slot: usize,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut flags = self.draining.get();
        flags[self.slot] = false;
        self.draining.set(flags);
    }
}

impl Bus {
    /// The default bus of the current thread, created on first access.
    ///
    /// `Bus` is `!Send`, so each thread gets its own default bus. Messages
    /// emitted here on one thread are never seen by handlers subscribed to
    /// `Bus::main()` on another.
    pub fn main() -> Bus {
        MAIN.with(Bus::clone)
    }

    /// A private bus with the system clock and default configuration.
    pub fn new() -> Self {
        BusBuilder::new().build()
    }

    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    pub(crate) fn from_parts(
        clock: Rc<dyn Clock>,
        config: BusConfig,
        declared: &[MessageType],
    ) -> Self {
        let mut registry = HandlerRegistry::new();
        for message_type in declared {
            // The builder only collects typed tags, never the wildcard key.
            let _ = registry.declare(*message_type);
        }

        Self {
            inner: Rc::new(BusInner {
                registry: RefCell::new(registry),
                scheduler: RefCell::new(DeferredScheduler::new()),
                observers: RefCell::new(Vec::new()),
                ids: UlidGenerator::new(Rc::clone(&clock)),
                clock,
                config,
                draining: Cell::new([false; 3]),
                totals: Cell::new(DeliveryCounts::default()),
            }),
        }
    }

    /// Whether two handles point at the same bus.
    pub fn same_bus(&self, other: &Bus) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.clock)
    }

    // ------------------------------------------------------------------
    // registration
    // ------------------------------------------------------------------

    /// Adds `T` to the known message types.
    pub fn declare<T: Message>(&self) {
        // Typed tags are never the wildcard key.
        let _ = self.inner.registry.borrow_mut().declare(T::TYPE);
    }

    pub fn is_declared(&self, message_type: MessageType) -> bool {
        !message_type.is_any() && self.inner.registry.borrow().is_subscribable(message_type)
    }

    /// Registers `handler` for `T`; the returned `Subscription` owns it.
    pub fn subscribe<T, H>(&self, handler: H) -> Subscription
    where
        T: Message,
        H: Handler<T> + 'static,
    {
        self.attach(T::TYPE, Rc::new(TypedHandler::<T, H>::new(handler)))
    }

    /// Like [`Bus::subscribe`], with a label used in failure reports.
    pub fn subscribe_named<T, H>(&self, name: &'static str, handler: H) -> Subscription
    where
        T: Message,
        H: Handler<T> + 'static,
    {
        self.attach(T::TYPE, Rc::new(TypedHandler::<T, H>::named(name, handler)))
    }

    /// Registers a wildcard handler that receives every message.
    pub fn subscribe_any<H>(&self, handler: H) -> Subscription
    where
        H: DynHandler + 'static,
    {
        self.attach(MessageType::ANY, Rc::new(handler))
    }

    fn attach(&self, message_type: MessageType, handler: Rc<dyn DynHandler>) -> Subscription {
        self.inner
            .registry
            .borrow_mut()
            .register_declaring(message_type, &handler);

        let id = self.inner.ids.generate_subscription_id();
        debug!(subscription = %id, %message_type, handler = handler.name(), "subscribed");

        Subscription {
            id,
            message_type,
            handler,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Weakly registers `handler` for `T`. The caller keeps it alive.
    ///
    /// Fails with [`BusError::InvalidSubscriptionType`] when the handler
    /// does not accept `T`.
    pub fn register<T: Message>(&self, handler: &Rc<dyn DynHandler>) -> Result<(), BusError> {
        if !handler.accepts(T::TYPE) {
            return Err(BusError::InvalidSubscriptionType(T::TYPE));
        }
        self.inner
            .registry
            .borrow_mut()
            .register_declaring(T::TYPE, handler);
        Ok(())
    }

    pub fn deregister<T: Message>(&self, handler: &Rc<dyn DynHandler>) {
        self.inner.registry.borrow_mut().remove(T::TYPE, handler);
    }

    /// Weakly registers `handler` under a runtime type token.
    ///
    /// The token must be a declared message type or [`MessageType::ANY`].
    pub fn register_unchecked(
        &self,
        message_type: MessageType,
        handler: &Rc<dyn DynHandler>,
    ) -> Result<(), BusError> {
        self.inner
            .registry
            .borrow_mut()
            .register(message_type, handler)
    }

    pub fn deregister_unchecked(
        &self,
        message_type: MessageType,
        handler: &Rc<dyn DynHandler>,
    ) -> Result<(), BusError> {
        self.inner
            .registry
            .borrow_mut()
            .deregister(message_type, handler)
    }

    // ------------------------------------------------------------------
    // error observers
    // ------------------------------------------------------------------

    pub fn add_error_observer<O>(&self, observer: O) -> ObserverId
    where
        O: ErrorObserver + 'static,
    {
        let id = self.inner.ids.generate_observer_id();
        let observer: Rc<dyn ErrorObserver> = Rc::new(observer);
        self.inner.observers.borrow_mut().push((id, observer));
        id
    }

    /// Returns `false` if no observer had that id.
    pub fn remove_error_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    // ------------------------------------------------------------------
    // emission
    // ------------------------------------------------------------------

    /// Stamps `message` with the caller location and delivers or queues it.
    ///
    /// `Immediate` messages are dispatched before this returns; every other
    /// phase waits for the next drain of that phase.
    #[track_caller]
    pub fn emit<M: Message>(&self, message: M) -> EmissionId {
        self.declare::<M>();
        self.send(Envelope::new(message), Location::caller())
    }

    /// Emits an already boxed message. Any previous stamp is replaced.
    #[track_caller]
    pub fn emit_envelope(&self, envelope: Envelope) -> EmissionId {
        self.send(envelope, Location::caller())
    }

    fn send(&self, mut envelope: Envelope, location: &'static Location<'static>) -> EmissionId {
        let id = self.inner.ids.generate_emission_id();
        envelope.stamp(id, CallerInfo::new(location, self.inner.clock.now()));
        self.bump(|totals| totals.emitted += 1);

        let phase = envelope.phase();
        if phase.is_immediate() {
            debug!(emission = %id, message = %envelope, "dispatching immediately");
            self.dispatch(&mut envelope);
        } else {
            debug!(emission = %id, message = %envelope, "queued");
            if let Err(err) = self.inner.scheduler.borrow_mut().enqueue(phase, envelope) {
                warn!(emission = %id, %err, "message dropped");
            }
        }
        id
    }

    fn dispatch(&self, envelope: &mut Envelope) -> DispatchOutcome {
        let outcome = Dispatcher::new(
            &self.inner.registry,
            &self.inner.observers,
            self.inner.clock.as_ref(),
        )
        .dispatch(envelope);

        self.bump(|totals| {
            totals.dispatched += 1;
            totals.handler_calls += outcome.handlers as u64;
            totals.failures += outcome.failures as u64;
        });
        outcome
    }

    fn bump(&self, update: impl FnOnce(&mut DeliveryCounts)) {
        let mut totals = self.inner.totals.get();
        update(&mut totals);
        self.inner.totals.set(totals);
    }

    // ------------------------------------------------------------------
    // draining
    // ------------------------------------------------------------------

    /// Drains `phase` within its configured budget.
    pub fn drain(&self, phase: Phase) -> DrainReport {
        self.drain_with(phase, self.inner.config.budgets.get(phase))
    }

    /// Dispatches queued messages of `phase` in FIFO order until the queue is
    /// empty or `budget` runs out. Messages emitted into `phase` while it is
    /// draining are picked up by the same call if the budget allows.
    ///
    /// A drain of a phase that is already draining further up the stack is
    /// refused and reports nothing processed.
    pub fn drain_with(&self, phase: Phase, budget: DrainBudget) -> DrainReport {
        let Some(slot) = phase.deferred_slot() else {
            return DrainReport::empty(phase, 0);
        };

        let mut flags = self.inner.draining.get();
        if flags[slot] {
            warn!(%phase, "phase is already draining; reentrant drain ignored");
            return DrainReport::empty(phase, self.pending(phase));
        }
        flags[slot] = true;
        self.inner.draining.set(flags);
        let _guard = DrainGuard {
            draining: &self.inner.draining,
            slot,
        };

        let mut tracker = BudgetTracker::start(budget, self.inner.clock.now());
        let stopped_by = loop {
            if let Some(limit) = tracker.exhausted(self.inner.clock.now()) {
                break Some(limit);
            }
            let next = self.inner.scheduler.borrow_mut().pop(phase);
            let Some(mut envelope) = next else {
                break None;
            };
            self.dispatch(&mut envelope);
            tracker.record();
        };

        let report = DrainReport {
            phase,
            processed: tracker.processed(),
            remaining: self.pending(phase),
            stopped_by,
        };
        if report.processed > 0 || report.stopped_by.is_some() {
            debug!(
                %phase,
                processed = report.processed,
                remaining = report.remaining,
                stopped_by = ?report.stopped_by,
                "drained"
            );
        }
        report
    }

    // ------------------------------------------------------------------
    // inspection
    // ------------------------------------------------------------------

    pub fn pending(&self, phase: Phase) -> usize {
        self.inner.scheduler.borrow().len(phase)
    }

    pub fn status(&self) -> BusStatus {
        let registry = self.inner.registry.borrow();
        BusStatus {
            pending: PhaseCounts::from_slots(self.inner.scheduler.borrow().len_per_phase()),
            typed_handlers: registry.typed_handler_count(),
            wildcard_handlers: registry.handler_count(MessageType::ANY),
            observers: self.inner.observers.borrow().len(),
            declared_types: registry.declared_types(),
            totals: self.inner.totals.get(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Owns a registered handler. Dropping it deregisters the handler.
pub struct Subscription {
    id: SubscriptionId,
    message_type: MessageType,
    handler: Rc<dyn DynHandler>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn handler(&self) -> &Rc<dyn DynHandler> {
        &self.handler
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        // If the registry is busy the entry still dies with `handler` and is
        // pruned on the next lookup.
        if let Ok(mut registry) = inner.registry.try_borrow_mut() {
            registry.remove(self.message_type, &self.handler);
        }
        debug!(subscription = %self.id, message_type = %self.message_type, "unsubscribed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Lets a message emit itself.
pub trait EmitSelf: Message + Sized {
    /// Emits on [`Bus::main`] of the calling thread.
    #[track_caller]
    fn emit_self(self) -> EmissionId {
        Bus::main().emit(self)
    }

    #[track_caller]
    fn emit_on(self, bus: &Bus) -> EmissionId {
        bus.emit(self)
    }
}

impl<M: Message> EmitSelf for M {}
