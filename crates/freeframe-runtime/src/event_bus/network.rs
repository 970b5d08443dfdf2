use std::sync::Arc;

use freeframe_protocol::{BusObject, PeerId};
use serde_json::Value;

use super::inbox::NetworkInbox;
use super::subscription::Subscription;
use crate::error::{FrameworkError, Result};
use crate::host::{ClientTransport, PeerDirectory, ServerTransport};

// ============================================================================
// Payload encoding
// ============================================================================

/// Typed network payloads travel as a single JSON argument.
fn encode<T: BusObject>(event: &T) -> Result<Vec<Value>> {
    Ok(vec![serde_json::to_value(event)?])
}

fn decode<T: BusObject>(args: &[Value]) -> serde_json::Result<T> {
    serde_json::from_value(args.first().cloned().unwrap_or(Value::Null))
}

// ============================================================================
// Server-side peer addressing
// ============================================================================

/// Peer resolution and sending shared by the typed and raw server buses.
#[derive(Clone)]
struct PeerLink {
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn ServerTransport>,
}

impl PeerLink {
    fn send_to(&self, peer: PeerId, channel: &str, args: Vec<Value>) -> Result<()> {
        let handle = self
            .directory
            .resolve(peer)
            .ok_or(FrameworkError::PeerNotConnected(peer))?;
        tracing::trace!(peer_id = %peer, channel = %channel, "sending to client");
        self.transport.trigger_client(&handle, channel, args);
        Ok(())
    }

    /// Targets are sent in iteration order. The first unresolvable id stops
    /// the fan-out; messages already handed to the transport stay sent.
    fn send_to_many(
        &self,
        peers: impl IntoIterator<Item = PeerId>,
        channel: &str,
        args: &[Value],
    ) -> Result<()> {
        for peer in peers {
            self.send_to(peer, channel, args.to_vec())?;
        }
        Ok(())
    }

    /// Peers are enumerated once, at call time.
    fn broadcast(&self, channel: &str, args: &[Value]) -> usize {
        let peers = self.directory.peers();
        for handle in &peers {
            self.transport.trigger_client(handle, channel, args.to_vec());
        }
        tracing::trace!(channel = %channel, peers = peers.len(), "broadcast to clients");
        peers.len()
    }
}

// ============================================================================
// Server buses
// ============================================================================

/// Typed server-side bus: sends to clients, receives from clients.
pub struct ServerNetworkEventBus {
    link: PeerLink,
    inbox: Arc<NetworkInbox>,
}

impl ServerNetworkEventBus {
    pub fn new(
        directory: Arc<dyn PeerDirectory>,
        transport: Arc<dyn ServerTransport>,
        inbox: Arc<NetworkInbox>,
    ) -> Self {
        Self {
            link: PeerLink {
                directory,
                transport,
            },
            inbox,
        }
    }

    pub fn publish_to<T: BusObject>(&self, peer: PeerId, event: &T) -> Result<()> {
        self.link.send_to(peer, &T::channel(), encode(event)?)
    }

    /// The event is encoded once and sent to each target in order.
    pub fn publish_to_many<T, I>(&self, peers: I, event: &T) -> Result<()>
    where
        T: BusObject,
        I: IntoIterator<Item = PeerId>,
    {
        let args = encode(event)?;
        self.link.send_to_many(peers, &T::channel(), &args)
    }

    /// Send to every connected peer. Returns how many peers were addressed.
    pub fn publish<T: BusObject>(&self, event: &T) -> Result<usize> {
        let args = encode(event)?;
        Ok(self.link.broadcast(&T::channel(), &args))
    }

    /// `callback` receives the sending peer and the decoded event. Payloads
    /// that do not decode as `T` are logged and dropped.
    pub fn subscribe<T, F>(&self, callback: F) -> Subscription
    where
        T: BusObject,
        F: Fn(PeerId, T) + Send + Sync + 'static,
    {
        let channel = T::channel();
        let name = channel.clone();
        let handler = move |source: Option<PeerId>, args: &[Value]| {
            let Some(source) = source else {
                tracing::warn!(channel = %name, "inbound event without a source peer, dropped");
                return;
            };
            match decode::<T>(args) {
                Ok(event) => callback(source, event),
                Err(e) => tracing::warn!(
                    channel = %name,
                    peer_id = %source,
                    error = %e,
                    "undecodable network event dropped"
                ),
            }
        };
        self.inbox.register(channel, Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inbox.unregister(subscription)
    }

    pub fn subscriber_count<T: BusObject>(&self) -> usize {
        self.inbox.subscriber_count(&T::channel())
    }
}

/// Untyped server-side bus over caller-chosen channel strings.
pub struct ServerRawNetworkEventBus {
    link: PeerLink,
    inbox: Arc<NetworkInbox>,
}

impl ServerRawNetworkEventBus {
    pub fn new(
        directory: Arc<dyn PeerDirectory>,
        transport: Arc<dyn ServerTransport>,
        inbox: Arc<NetworkInbox>,
    ) -> Self {
        Self {
            link: PeerLink {
                directory,
                transport,
            },
            inbox,
        }
    }

    pub fn publish_to(&self, peer: PeerId, channel: &str, args: Vec<Value>) -> Result<()> {
        self.link.send_to(peer, channel, args)
    }

    pub fn publish_to_many<I>(&self, peers: I, channel: &str, args: Vec<Value>) -> Result<()>
    where
        I: IntoIterator<Item = PeerId>,
    {
        self.link.send_to_many(peers, channel, &args)
    }

    pub fn publish(&self, channel: &str, args: Vec<Value>) -> usize {
        self.link.broadcast(channel, &args)
    }

    pub fn subscribe<F>(&self, channel: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(PeerId, &[Value]) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let name = channel.clone();
        let handler = move |source: Option<PeerId>, args: &[Value]| match source {
            Some(source) => callback(source, args),
            None => tracing::warn!(channel = %name, "inbound event without a source peer, dropped"),
        };
        self.inbox.register(channel, Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inbox.unregister(subscription)
    }
}

// ============================================================================
// Client buses
// ============================================================================

/// Typed client-side bus: sends to the server, receives from the server.
pub struct ClientNetworkEventBus {
    transport: Arc<dyn ClientTransport>,
    inbox: Arc<NetworkInbox>,
}

impl ClientNetworkEventBus {
    pub fn new(transport: Arc<dyn ClientTransport>, inbox: Arc<NetworkInbox>) -> Self {
        Self { transport, inbox }
    }

    pub fn publish<T: BusObject>(&self, event: &T) -> Result<()> {
        let channel = T::channel();
        self.transport.trigger_server(&channel, encode(event)?);
        tracing::trace!(channel = %channel, "sent to server");
        Ok(())
    }

    pub fn subscribe<T, F>(&self, callback: F) -> Subscription
    where
        T: BusObject,
        F: Fn(T) + Send + Sync + 'static,
    {
        let channel = T::channel();
        let name = channel.clone();
        let handler = move |_: Option<PeerId>, args: &[Value]| match decode::<T>(args) {
            Ok(event) => callback(event),
            Err(e) => tracing::warn!(channel = %name, error = %e, "undecodable network event dropped"),
        };
        self.inbox.register(channel, Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inbox.unregister(subscription)
    }

    pub fn subscriber_count<T: BusObject>(&self) -> usize {
        self.inbox.subscriber_count(&T::channel())
    }
}

pub struct ClientRawNetworkEventBus {
    transport: Arc<dyn ClientTransport>,
    inbox: Arc<NetworkInbox>,
}

impl ClientRawNetworkEventBus {
    pub fn new(transport: Arc<dyn ClientTransport>, inbox: Arc<NetworkInbox>) -> Self {
        Self { transport, inbox }
    }

    pub fn publish(&self, channel: &str, args: Vec<Value>) {
        self.transport.trigger_server(channel, args);
    }

    pub fn subscribe<F>(&self, channel: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let handler = move |_: Option<PeerId>, args: &[Value]| callback(args);
        self.inbox.register(channel.into(), Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inbox.unregister(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::Dispatcher;
    use crate::host::MemoryHost;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ScoreChanged {
        score: i64,
    }

    impl BusObject for ScoreChanged {
        fn namespace() -> String {
            "Arena".to_string()
        }
    }

    fn server_bus(host: &Arc<MemoryHost>) -> (ServerNetworkEventBus, Arc<NetworkInbox>, Dispatcher) {
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = Arc::new(NetworkInbox::new(dispatcher.clone()));
        let bus = ServerNetworkEventBus::new(host.clone(), host.clone(), inbox.clone());
        (bus, inbox, dispatcher)
    }

    fn populated_host() -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost::new());
        for (id, name) in [(1u32, "ann"), (2, "bob"), (3, "cat"), (5, "eve")] {
            host.connect_peer(id, name);
        }
        host
    }

    #[tokio::test]
    async fn test_publish_to_many_reaches_only_targets() {
        let host = populated_host();
        let (bus, _, _) = server_bus(&host);

        bus.publish_to_many([PeerId::new(2), PeerId::new(5)], &ScoreChanged { score: 10 })
            .unwrap();

        let targets: Vec<Option<PeerId>> = host.sent().iter().map(|m| m.target).collect();
        assert_eq!(targets, vec![Some(PeerId::new(2)), Some(PeerId::new(5))]);
        for msg in host.sent() {
            assert_eq!(msg.channel, "__FFE:Arena.ScoreChanged");
            assert_eq!(msg.args, vec![json!({"score": 10})]);
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_connected_peer() {
        let host = populated_host();
        let (bus, _, _) = server_bus(&host);

        let addressed = bus.publish(&ScoreChanged { score: 1 }).unwrap();

        assert_eq!(addressed, 4);
        assert_eq!(host.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_peer_fails_after_earlier_sends() {
        let host = populated_host();
        let (bus, _, _) = server_bus(&host);

        let err = bus
            .publish_to_many(
                [PeerId::new(1), PeerId::new(9), PeerId::new(2)],
                &ScoreChanged { score: 3 },
            )
            .unwrap_err();

        assert!(matches!(err, FrameworkError::PeerNotConnected(id) if id == PeerId::new(9)));
        let targets: Vec<Option<PeerId>> = host.sent().iter().map(|m| m.target).collect();
        assert_eq!(targets, vec![Some(PeerId::new(1))]);
    }

    #[tokio::test]
    async fn test_publish_to_disconnected_peer() {
        let host = populated_host();
        let (bus, _, _) = server_bus(&host);
        host.disconnect_peer(3u32);

        let err = bus.publish_to(PeerId::new(3), &ScoreChanged { score: 0 }).unwrap_err();
        assert!(matches!(err, FrameworkError::PeerNotConnected(_)));
        assert!(host.sent().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_event_decoded_with_source() {
        let host = populated_host();
        let (bus, inbox, dispatcher) = server_bus(&host);
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        bus.subscribe(move |peer: PeerId, event: ScoreChanged| sink.lock().push((peer, event)));

        inbox.receive(
            Some(PeerId::new(5)),
            &ScoreChanged::channel(),
            vec![json!({"score": 99})],
        );
        dispatcher.settle().await;

        assert_eq!(
            *received.lock(),
            vec![(PeerId::new(5), ScoreChanged { score: 99 })]
        );
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped() {
        let host = populated_host();
        let (bus, inbox, dispatcher) = server_bus(&host);
        let received = Arc::new(Mutex::new(0));

        let sink = received.clone();
        bus.subscribe(move |_: PeerId, _: ScoreChanged| *sink.lock() += 1);

        inbox.receive(Some(PeerId::new(1)), &ScoreChanged::channel(), vec![json!("garbage")]);
        inbox.receive(Some(PeerId::new(1)), &ScoreChanged::channel(), vec![]);
        inbox.receive(Some(PeerId::new(1)), &ScoreChanged::channel(), vec![json!({"score": 4})]);
        dispatcher.settle().await;

        assert_eq!(*received.lock(), 1);
    }

    #[tokio::test]
    async fn test_raw_subscriber_sees_typed_channel() {
        let host = populated_host();
        let (bus, inbox, dispatcher) = server_bus(&host);
        let raw = ServerRawNetworkEventBus::new(host.clone(), host.clone(), inbox.clone());
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        raw.subscribe("__FFE:Arena.ScoreChanged", move |peer, args| {
            sink.lock().push((peer, args.to_vec()));
        });
        assert_eq!(bus.subscriber_count::<ScoreChanged>(), 1);

        inbox.receive(Some(PeerId::new(2)), "__FFE:Arena.ScoreChanged", vec![json!({"score": 7})]);
        dispatcher.settle().await;

        assert_eq!(
            *received.lock(),
            vec![(PeerId::new(2), vec![json!({"score": 7})])]
        );
    }

    #[tokio::test]
    async fn test_raw_publish_targets() {
        let host = populated_host();
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = Arc::new(NetworkInbox::new(dispatcher));
        let raw = ServerRawNetworkEventBus::new(host.clone(), host.clone(), inbox);

        raw.publish_to(PeerId::new(1), "chat", vec![json!("hi ann")]).unwrap();
        assert_eq!(raw.publish("chat", vec![json!("hi all")]), 4);

        assert_eq!(host.sent_to(PeerId::new(1)).len(), 2);
        assert_eq!(host.sent_to(PeerId::new(5))[0].args, vec![json!("hi all")]);
    }

    #[tokio::test]
    async fn test_client_round_trip_through_transport() {
        let host = Arc::new(MemoryHost::new());
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = Arc::new(NetworkInbox::new(dispatcher.clone()));
        let bus = ClientNetworkEventBus::new(host.clone(), inbox.clone());
        let received = Arc::new(Mutex::new(Vec::new()));

        bus.publish(&ScoreChanged { score: 12 }).unwrap();
        let sent = host.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, None);

        let sink = received.clone();
        let sub = bus.subscribe(move |event: ScoreChanged| sink.lock().push(event.score));
        inbox.receive(None, &sent[0].channel, sent[0].args.clone());
        dispatcher.settle().await;
        assert_eq!(*received.lock(), vec![12]);

        assert!(bus.unsubscribe(&sub));
        inbox.receive(None, &sent[0].channel, sent[0].args.clone());
        dispatcher.settle().await;
        assert_eq!(*received.lock(), vec![12]);
    }

    #[tokio::test]
    async fn test_client_raw_bus() {
        let host = Arc::new(MemoryHost::new());
        let dispatcher = Dispatcher::spawn().unwrap();
        let inbox = Arc::new(NetworkInbox::new(dispatcher.clone()));
        let raw = ClientRawNetworkEventBus::new(host.clone(), inbox.clone());
        let received = Arc::new(Mutex::new(Vec::new()));

        raw.publish("hud:refresh", vec![json!(true)]);
        assert_eq!(host.sent()[0].channel, "hud:refresh");

        let sink = received.clone();
        raw.subscribe("hud:refresh", move |args| sink.lock().extend_from_slice(args));
        inbox.receive(None, "hud:refresh", vec![json!(1), json!(2)]);
        dispatcher.settle().await;

        assert_eq!(*received.lock(), vec![json!(1), json!(2)]);
    }
}
