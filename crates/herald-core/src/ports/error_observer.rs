//! ErrorObserver port - 配送中の失敗の受け口
//!
//! ハンドラの失敗と require-listener 違反はすべてここに集約されます。
//! emit した側には何も返りません。

use crate::domain::{DispatchFailure, Envelope};

/// Callback receiving `(failure, originating message)`.
///
/// Closures of the same shape implement this trait directly.
pub trait ErrorObserver {
    fn on_failure(&self, failure: &DispatchFailure, envelope: &Envelope);
}

impl<F> ErrorObserver for F
where
    F: Fn(&DispatchFailure, &Envelope),
{
    fn on_failure(&self, failure: &DispatchFailure, envelope: &Envelope) {
        self(failure, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageType;
    use crate::domain::message::fixtures::Ping;
    use std::cell::RefCell;

    #[test]
    fn closures_are_observers() {
        let seen = RefCell::new(Vec::new());
        let observer = |failure: &DispatchFailure, envelope: &Envelope| {
            seen.borrow_mut()
                .push(format!("{} / {}", failure, envelope.message_type()));
        };

        let failure = DispatchFailure::MissingTypedListener {
            message_type: MessageType::of::<Ping>(),
        };
        observer.on_failure(&failure, &Envelope::new(Ping(1)));

        assert_eq!(
            seen.into_inner(),
            vec!["No specific listener for message test.ping / test.ping".to_string()]
        );
    }
}
