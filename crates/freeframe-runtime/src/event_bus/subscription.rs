use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Handle returned by every `subscribe` call.
///
/// Pass it back to the bus's `unsubscribe` to remove exactly that callback.
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: Uuid,
    channel: String,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// channel -> callbacks, in subscription order.
pub(crate) struct HandlerTable<H: ?Sized> {
    entries: RwLock<HashMap<String, Vec<(Uuid, Arc<H>)>>>,
}

impl<H: ?Sized> Default for HandlerTable<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<H: ?Sized> HandlerTable<H> {
    pub(crate) fn insert(&self, channel: String, handler: Arc<H>) -> Subscription {
        let id = Uuid::new_v4();
        self.entries
            .write()
            .entry(channel.clone())
            .or_default()
            .push((id, handler));
        tracing::debug!(channel = %channel, subscription = %id, "subscribed");
        Subscription { id, channel }
    }

    pub(crate) fn remove(&self, subscription: &Subscription) -> bool {
        let mut entries = self.entries.write();
        let Some(handlers) = entries.get_mut(&subscription.channel) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;

        if handlers.is_empty() {
            entries.remove(&subscription.channel);
        }
        if removed {
            tracing::debug!(
                channel = %subscription.channel,
                subscription = %subscription.id,
                "unsubscribed"
            );
        }
        removed
    }

    /// Callbacks registered right now. Delivery works on this copy so a
    /// callback may subscribe or unsubscribe without deadlocking.
    pub(crate) fn snapshot(&self, channel: &str) -> Vec<Arc<H>> {
        self.entries
            .read()
            .get(channel)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, channel: &str) -> usize {
        self.entries.read().get(channel).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Handler = dyn Fn() -> u32 + Send + Sync;

    #[test]
    fn test_multicast_in_subscription_order() {
        let table: HandlerTable<Handler> = HandlerTable::default();
        table.insert("a".to_string(), Arc::new(|| 1));
        table.insert("a".to_string(), Arc::new(|| 2));
        table.insert("b".to_string(), Arc::new(|| 3));

        let results: Vec<u32> = table.snapshot("a").iter().map(|h| h()).collect();
        assert_eq!(results, vec![1, 2]);
        assert_eq!(table.count("b"), 1);
        assert!(table.snapshot("c").is_empty());
    }

    #[test]
    fn test_remove_only_that_subscription() {
        let table: HandlerTable<Handler> = HandlerTable::default();
        let first = table.insert("a".to_string(), Arc::new(|| 1));
        table.insert("a".to_string(), Arc::new(|| 2));

        assert!(table.remove(&first));
        assert!(!table.remove(&first));

        let results: Vec<u32> = table.snapshot("a").iter().map(|h| h()).collect();
        assert_eq!(results, vec![2]);
    }

    #[test]
    fn test_empty_channel_is_dropped() {
        let table: HandlerTable<Handler> = HandlerTable::default();
        let sub = table.insert("a".to_string(), Arc::new(|| 1));
        assert_eq!(sub.channel(), "a");

        table.remove(&sub);
        assert_eq!(table.count("a"), 0);
        assert!(table.entries.read().is_empty());
    }
}
