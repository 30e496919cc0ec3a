//! Info messages: leveled diagnostics that travel over the bus itself.
//!
//! Each level is its own message type so a listener can subscribe to
//! warnings only. All of them are delivered `Immediate`.

use std::fmt;

use serde_json::Value;

use super::message::{Message, MessageType, Phase, RequireListener};

/// Severity of an info message, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InfoLevel {
    Verbose = 0,
    Debug = 1,
    Warning = 2,
    Error = 3,
}

/// Payload shared by every info level.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoBody {
    pub origin: String,
    pub text: String,
    pub value: Option<Value>,
}

impl InfoBody {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl fmt::Display for InfoBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "'{}': {}", self.text, value)?,
            None => write!(f, "'{}'", self.text)?,
        }
        write!(f, "\nFrom {}", self.origin)
    }
}

macro_rules! info_message {
    ($(#[$meta:meta])* $name:ident, $level:expr, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(pub InfoBody);

        impl $name {
            pub const LEVEL: InfoLevel = $level;

            pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
                Self(InfoBody::new(origin, text))
            }

            pub fn with_value(self, value: Value) -> Self {
                Self(self.0.with_value(value))
            }

            pub fn body(&self) -> &InfoBody {
                &self.0
            }
        }

        impl Message for $name {
            const TYPE: MessageType = MessageType::new($tag);

            fn phase(&self) -> Phase {
                Phase::Immediate
            }

            fn require_listener(&self) -> RequireListener {
                RequireListener::None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $tag, self.0)
            }
        }
    };
}

info_message!(
    /// Chatter useful only while tracing a problem.
    Verbose, InfoLevel::Verbose, "herald.info.verbose"
);
info_message!(Debug, InfoLevel::Debug, "herald.info.debug");
info_message!(Warning, InfoLevel::Warning, "herald.info.warning");
info_message!(
    /// Something went wrong but the emitter carried on.
    Error, InfoLevel::Error, "herald.info.error"
);
