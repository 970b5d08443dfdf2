use std::any::Any;
use std::sync::Arc;

use freeframe_protocol::BusObject;

use super::dispatcher::Dispatcher;
use super::subscription::{HandlerTable, Subscription};

type LocalHandler = dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync;

/// Typed event bus confined to one process side.
///
/// Events never cross a serialization boundary here: every subscriber sees
/// the same shared instance.
pub struct EventBus {
    dispatcher: Dispatcher,
    handlers: HandlerTable<LocalHandler>,
}

impl EventBus {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            handlers: HandlerTable::default(),
        }
    }

    /// Deliver `event` to the subscribers registered right now.
    ///
    /// Returns before any subscriber runs. With no subscribers the event is
    /// dropped.
    pub fn publish<T: BusObject>(&self, event: T) {
        let channel = T::channel();
        let handlers = self.handlers.snapshot(&channel);
        if handlers.is_empty() {
            tracing::trace!(channel = %channel, "no local subscribers, event dropped");
            return;
        }

        let event = Arc::new(event);
        for handler in handlers {
            let event = event.clone();
            self.dispatcher
                .dispatch(move || handler(&*event as &(dyn Any + Send + Sync)));
        }
    }

    pub fn subscribe<T, F>(&self, callback: F) -> Subscription
    where
        T: BusObject,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let channel = T::channel();
        let handler = move |event: &(dyn Any + Send + Sync)| match event.downcast_ref::<T>() {
            Some(event) => callback(event),
            // Two distinct types that resolve to the same channel name.
            None => tracing::warn!(
                expected = std::any::type_name::<T>(),
                "local event type does not match channel subscriber"
            ),
        };
        self.handlers.insert(channel, Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.handlers.remove(subscription)
    }

    pub fn subscriber_count<T: BusObject>(&self) -> usize {
        self.handlers.count(&T::channel())
    }
}
