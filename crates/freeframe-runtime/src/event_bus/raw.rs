use std::sync::Arc;

use serde_json::Value;

use super::dispatcher::Dispatcher;
use super::subscription::{HandlerTable, Subscription};

type RawHandler = dyn Fn(&[Value]) + Send + Sync;

/// Untyped local bus addressed by caller-chosen channel strings.
pub struct RawEventBus {
    dispatcher: Dispatcher,
    handlers: HandlerTable<RawHandler>,
}

impl RawEventBus {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            handlers: HandlerTable::default(),
        }
    }

    pub fn publish(&self, channel: &str, args: Vec<Value>) {
        let handlers = self.handlers.snapshot(channel);
        if handlers.is_empty() {
            tracing::trace!(channel = %channel, "no raw subscribers, event dropped");
            return;
        }

        let args: Arc<[Value]> = args.into();
        for handler in handlers {
            let args = args.clone();
            self.dispatcher.dispatch(move || handler(&args[..]));
        }
    }

    pub fn subscribe<F>(&self, channel: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.handlers.insert(channel.into(), Arc::new(callback))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.handlers.remove(subscription)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.handlers.count(channel)
    }
}
