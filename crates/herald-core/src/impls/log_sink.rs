//! Log sink - バスを流れるメッセージと配送失敗をテキストで書き出す
//!
//! `attach_sink` は 2 つを登録します:
//! - wildcard ハンドラ: 配送された全メッセージの表示文字列を書く
//! - ErrorObserver: `Error handling <message>: <failure>` を書く
//!
//! 戻り値の `SinkAttachment` を drop すると両方とも外れます。

use std::rc::Rc;

use crate::app::bus::{Bus, Subscription};
use crate::domain::{DispatchFailure, Envelope, ObserverId};
use crate::typed::any_fn;

/// Destination for one line of diagnostic text.
pub trait MessageSink {
    fn output_message(&self, message: &str);
}

/// Writes each line as a `tracing` event under the `herald::sink` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn output_message(&self, message: &str) {
        tracing::info!(target: "herald::sink", "{message}");
    }
}

impl<S: MessageSink + ?Sized> MessageSink for Rc<S> {
    fn output_message(&self, message: &str) {
        (**self).output_message(message)
    }
}

/// Keeps a sink attached to a bus. Dropping it detaches the sink.
pub struct SinkAttachment {
    bus: Bus,
    subscription: Option<Subscription>,
    observer: ObserverId,
}

impl SinkAttachment {
    pub fn observer_id(&self) -> ObserverId {
        self.observer
    }

    pub fn detach(self) {}
}

impl Drop for SinkAttachment {
    fn drop(&mut self) {
        self.subscription.take();
        self.bus.remove_error_observer(self.observer);
    }
}

pub fn attach_sink<S>(bus: &Bus, sink: S) -> SinkAttachment
where
    S: MessageSink + 'static,
{
    let sink = Rc::new(sink);

    let messages = Rc::clone(&sink);
    let subscription = bus.subscribe_any(
        any_fn(move |envelope: &Envelope| {
            messages.output_message(&envelope.to_string());
            Ok(())
        })
        .named("message_sink"),
    );

    let observer = bus.add_error_observer(move |failure: &DispatchFailure, envelope: &Envelope| {
        sink.output_message(&format!("Error handling {envelope}: {failure}"));
    });

    SinkAttachment {
        bus: bus.clone(),
        subscription: Some(subscription),
        observer,
    }
}
