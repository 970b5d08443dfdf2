use std::sync::Arc;

use freeframe_protocol::PeerId;
use serde_json::Value;

use super::dispatcher::Dispatcher;
use super::subscription::{HandlerTable, Subscription};
use crate::error::Result;

pub(crate) type InboundHandler = dyn Fn(Option<PeerId>, &[Value]) + Send + Sync;

/// Entry point for messages arriving from the other side of the network.
///
/// The host calls [`NetworkInbox::receive`] for every inbound message. Typed
/// and raw network subscribers of a side share this inbox, so a raw
/// subscriber on a `__FFE:` channel also sees typed traffic.
pub struct NetworkInbox {
    dispatcher: Dispatcher,
    handlers: HandlerTable<InboundHandler>,
}

impl NetworkInbox {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            handlers: HandlerTable::default(),
        }
    }

    /// `source` is the sending peer on the server side and `None` on the
    /// client side, where everything comes from the server.
    pub fn receive(&self, source: Option<PeerId>, channel: &str, args: Vec<Value>) {
        let handlers = self.handlers.snapshot(channel);
        if handlers.is_empty() {
            tracing::trace!(channel = %channel, source = ?source, "no network subscribers, event dropped");
            return;
        }

        let args: Arc<[Value]> = args.into();
        for handler in handlers {
            let args = args.clone();
            self.dispatcher.dispatch(move || handler(source, &args[..]));
        }
    }

    /// Like [`NetworkInbox::receive`] for hosts that report the source as a
    /// string handle.
    pub fn receive_from_handle(&self, source: &str, channel: &str, args: Vec<Value>) -> Result<()> {
        let source: PeerId = source.parse()?;
        self.receive(Some(source), channel, args);
        Ok(())
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.handlers.count(channel)
    }

    pub(crate) fn register(&self, channel: String, handler: Arc<InboundHandler>) -> Subscription {
        self.handlers.insert(channel, handler)
    }

    pub(crate) fn unregister(&self, subscription: &Subscription) -> bool {
        self.handlers.remove(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameworkError;
    use parking_lot::Mutex;
    use serde_json::json;

    #[tokio::test]
    async fn test_receive_fans_out_with_source() {
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = NetworkInbox::new(dispatcher.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            inbox.register(
                "vote".to_string(),
                Arc::new(move |source: Option<PeerId>, args: &[Value]| {
                    seen.lock().push((source, args.to_vec()));
                }),
            );
        }

        inbox.receive(Some(PeerId::new(3)), "vote", vec![json!("yes")]);
        dispatcher.settle().await;

        assert_eq!(
            *seen.lock(),
            vec![
                (Some(PeerId::new(3)), vec![json!("yes")]),
                (Some(PeerId::new(3)), vec![json!("yes")]),
            ]
        );
    }

    #[tokio::test]
    async fn test_receive_from_string_handle() {
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = NetworkInbox::new(dispatcher.clone());
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        inbox.register(
            "vote".to_string(),
            Arc::new(move |source: Option<PeerId>, _: &[Value]| *sink.lock() = source),
        );

        inbox.receive_from_handle("14", "vote", vec![]).unwrap();
        let err = inbox.receive_from_handle("nobody", "vote", vec![]).unwrap_err();
        dispatcher.settle().await;

        assert_eq!(*seen.lock(), Some(PeerId::new(14)));
        assert!(matches!(err, FrameworkError::InvalidPeerHandle(_)));
    }
}
