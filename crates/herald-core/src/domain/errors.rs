//! Errors - ハンドラ失敗と配送時の診断
//!
//! # 分類
//! - **HandlerError**: ハンドラが返す失敗値
//! - **DispatchFailure**: ErrorObserver に渡される失敗（呼び出し元には伝播しない）

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use super::message::MessageType;

/// HandlerError はハンドラ実行の失敗
#[derive(Debug)]
pub struct HandlerError {
    message: String,
    source: Option<Box<dyn StdError + 'static>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping it reachable through `source()`.
    pub fn from_error<E: StdError + 'static>(error: E) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref()
    }
}

/// A failure observed while dispatching one message.
///
/// Handed to every error observer together with the originating envelope.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("handler '{handler}' failed: {error}")]
    HandlerFailed {
        handler: String,
        #[source]
        error: HandlerError,
    },

    #[error("handler '{handler}' panicked: {panic}")]
    HandlerPanicked { handler: String, panic: String },

    #[error("No specific listener for message {message_type}")]
    MissingTypedListener { message_type: MessageType },

    #[error("No generic listener for message {message_type}")]
    MissingWildcardListener { message_type: MessageType },

    #[error("No listener for message {message_type}")]
    MissingAnyListener { message_type: MessageType },
}

impl DispatchFailure {
    /// True for the require-listener diagnostics, false for handler failures.
    pub fn is_missing_listener(&self) -> bool {
        matches!(
            self,
            DispatchFailure::MissingTypedListener { .. }
                | DispatchFailure::MissingWildcardListener { .. }
                | DispatchFailure::MissingAnyListener { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_keeps_its_source() {
        let io = std::io::Error::other("disk on fire");
        let err = HandlerError::from_error(io);

        assert_eq!(err.message(), "disk on fire");
        assert!(err.source().is_some());
        assert!(HandlerError::new("plain").source().is_none());
    }

    #[test]
    fn missing_listener_messages_name_the_type() {
        let ty = MessageType::new("demo.change_color");

        let typed = DispatchFailure::MissingTypedListener { message_type: ty };
        let any = DispatchFailure::MissingAnyListener { message_type: ty };

        assert_eq!(
            typed.to_string(),
            "No specific listener for message demo.change_color"
        );
        assert_eq!(any.to_string(), "No listener for message demo.change_color");
        assert!(typed.is_missing_listener());
    }

    #[test]
    fn handler_failure_chains_to_handler_error() {
        let failure = DispatchFailure::HandlerFailed {
            handler: "cube".into(),
            error: HandlerError::new("bad color"),
        };

        assert_eq!(failure.to_string(), "handler 'cube' failed: bad color");
        assert!(failure.source().is_some());
        assert!(!failure.is_missing_listener());
    }
}
