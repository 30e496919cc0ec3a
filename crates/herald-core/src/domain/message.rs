//! Message - 型タグ付きイベントの定義
//!
//! # 二層構造
//! - **表層（Typed）**: `Message` trait - `const TYPE` で型タグを静的に宣言
//! - **内部（Dyn）**: `DynMessage` trait - object-safe、キューに積むための type erasure
//!
//! ルーティングはリフレクションではなく `MessageType`（明示的な型タグ）で行います。

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Scheduling bucket a message is delivered in.
///
/// `Immediate` runs on the emitting call stack; every other phase is queued
/// until the tick source drains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Immediate,
    #[default]
    Update,
    LateUpdate,
    FixedUpdate,
}

impl Phase {
    /// The phases that own a queue, in drain order within one frame.
    pub const DEFERRED: [Phase; 3] = [Phase::Update, Phase::LateUpdate, Phase::FixedUpdate];

    pub fn is_immediate(self) -> bool {
        self == Phase::Immediate
    }

    /// Queue index for a deferred phase, `None` for `Immediate`.
    pub fn deferred_slot(self) -> Option<usize> {
        match self {
            Phase::Immediate => None,
            Phase::Update => Some(0),
            Phase::LateUpdate => Some(1),
            Phase::FixedUpdate => Some(2),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Immediate => "Immediate",
            Phase::Update => "Update",
            Phase::LateUpdate => "LateUpdate",
            Phase::FixedUpdate => "FixedUpdate",
        };
        f.write_str(name)
    }
}

/// Which listener sets must be non-empty when a message is dispatched.
///
/// A violation is reported to the error observers; delivery still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequireListener {
    None,
    #[default]
    Typed,
    Wildcard,
    /// Satisfied when either the typed or the wildcard set has a listener.
    Any,
}

/// Stable routing tag of a message variant.
///
/// # 命名規約
/// - `{namespace}.{name}`、例: `demo.change_color`
/// - `herald.any` は wildcard 用に予約済み
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageType(&'static str);

impl MessageType {
    /// Reserved key for wildcard handlers that receive every message.
    pub const ANY: MessageType = MessageType("herald.any");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn of<M: Message>() -> Self {
        M::TYPE
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Message は型タグとスケジューリング方針を持つイベント
///
/// # 使用例
/// ```ignore
/// #[derive(Debug)]
/// struct ChangeColor { color: Color }
///
/// impl Message for ChangeColor {
///     const TYPE: MessageType = MessageType::new("demo.change_color");
/// }
/// ```
///
/// `phase()` と `require_listener()` は variant ごとに上書きできます。
pub trait Message: fmt::Debug + 'static {
    const TYPE: MessageType;

    fn phase(&self) -> Phase {
        Phase::default()
    }

    fn require_listener(&self) -> RequireListener {
        RequireListener::default()
    }
}

/// Object-safe view of a [`Message`], used once the concrete type is erased.
pub trait DynMessage: fmt::Debug {
    fn message_type(&self) -> MessageType;
    fn phase(&self) -> Phase;
    fn require_listener(&self) -> RequireListener;
    fn as_any(&self) -> &dyn Any;
}

impl<M: Message> DynMessage for M {
    fn message_type(&self) -> MessageType {
        M::TYPE
    }

    fn phase(&self) -> Phase {
        Message::phase(self)
    }

    fn require_listener(&self) -> RequireListener {
        Message::require_listener(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct Defaults;

    impl Message for Defaults {
        const TYPE: MessageType = MessageType::new("test.defaults");
    }

    #[test]
    fn message_defaults_to_update_and_typed_listener() {
        let msg = Defaults;
        assert_eq!(Message::phase(&msg), Phase::Update);
        assert_eq!(Message::require_listener(&msg), RequireListener::Typed);
    }

    #[test]
    fn dyn_message_exposes_tag_and_downcasts() {
        let boxed: Box<dyn DynMessage> = Box::new(Ping(7));

        assert_eq!(boxed.message_type(), Ping::TYPE);
        assert_eq!(boxed.phase(), Phase::Immediate);
        assert_eq!(boxed.as_any().downcast_ref::<Ping>(), Some(&Ping(7)));
        assert!(boxed.as_any().downcast_ref::<Pong>().is_none());
    }

    #[rstest]
    #[case(Phase::Immediate, None)]
    #[case(Phase::Update, Some(0))]
    #[case(Phase::LateUpdate, Some(1))]
    #[case(Phase::FixedUpdate, Some(2))]
    fn deferred_slot_matches_phase(#[case] phase: Phase, #[case] slot: Option<usize>) {
        assert_eq!(phase.deferred_slot(), slot);
    }

    #[test]
    fn any_tag_is_reserved() {
        assert!(MessageType::ANY.is_any());
        assert!(!MessageType::of::<Ping>().is_any());
        assert_eq!(MessageType::of::<Pong>().to_string(), "test.pong");
    }

    #[test]
    fn phase_and_policy_use_snake_case_in_json() {
        assert_eq!(
            serde_json::to_string(&Phase::LateUpdate).unwrap(),
            "\"late_update\""
        );
        let policy: RequireListener = serde_json::from_str("\"wildcard\"").unwrap();
        assert_eq!(policy, RequireListener::Wildcard);
    }
}
