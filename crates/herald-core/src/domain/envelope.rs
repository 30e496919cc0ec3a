//! Envelope - emit されたメッセージとそのメタ情報
//!
//! # フィールド
//! - message: 型消去されたメッセージ本体
//! - id / caller_info: emit 時に一度だけ設定（それまでは None）

use std::fmt;

use chrono::{DateTime, Utc};

use super::caller::CallerInfo;
use super::ids::EmissionId;
use super::message::{DynMessage, Message, MessageType, Phase, RequireListener};

/// A message on its way through the bus.
pub struct Envelope {
    id: Option<EmissionId>,
    message: Box<dyn DynMessage>,
    caller_info: Option<CallerInfo>,
}

impl Envelope {
    pub fn new<M: Message>(message: M) -> Self {
        Self::from_boxed(Box::new(message))
    }

    pub fn from_boxed(message: Box<dyn DynMessage>) -> Self {
        Self {
            id: None,
            message,
            caller_info: None,
        }
    }

    pub fn id(&self) -> Option<EmissionId> {
        self.id
    }

    pub fn message(&self) -> &dyn DynMessage {
        self.message.as_ref()
    }

    /// Typed access to the payload; `None` when the envelope carries another type.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.message.as_any().downcast_ref::<M>()
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    pub fn phase(&self) -> Phase {
        self.message.phase()
    }

    pub fn require_listener(&self) -> RequireListener {
        self.message.require_listener()
    }

    pub fn caller_info(&self) -> Option<&CallerInfo> {
        self.caller_info.as_ref()
    }

    pub fn is_emitted(&self) -> bool {
        self.caller_info.is_some()
    }

    pub(crate) fn stamp(&mut self, id: EmissionId, caller_info: CallerInfo) {
        self.id = Some(id);
        self.caller_info = Some(caller_info);
    }

    pub(crate) fn mark_delivered(&mut self, at: DateTime<Utc>) {
        if let Some(info) = self.caller_info.as_mut() {
            info.mark_delivered(at);
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("type", &self.message_type())
            .field("message", &self.message)
            .field("caller_info", &self.caller_info)
            .finish()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(info) = &self.caller_info {
            write!(f, "{info}: ")?;
        }
        write!(f, "[On {}] {}", self.phase(), self.message_type())
    }
}
