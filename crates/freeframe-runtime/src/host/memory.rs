use std::collections::{BTreeMap, HashMap};

use freeframe_protocol::PeerId;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::{ClientTransport, KvpStore, PeerDirectory, PeerHandle, ServerTransport};

/// A message handed to the host transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Receiving peer, or `None` when the message went to the server.
    pub target: Option<PeerId>,
    pub channel: String,
    pub args: Vec<Value>,
}

/// In-process host: peer directory, recording transport and KVP cells.
///
/// Nothing leaves the process. Outbound messages are recorded so they can be
/// inspected or replayed into another side's inbox.
#[derive(Default)]
pub struct MemoryHost {
    /// peer_id -> handle, ordered so enumeration is stable
    peers: RwLock<BTreeMap<PeerId, PeerHandle>>,
    outbox: Mutex<Vec<SentMessage>>,
    cells: RwLock<HashMap<String, String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected peer. A reconnect with the same id replaces the
    /// previous handle.
    pub fn connect_peer(&self, id: impl Into<PeerId>, name: impl Into<String>) -> PeerHandle {
        let handle = PeerHandle::new(id.into(), name);
        let mut peers = self.peers.write();

        if let Some(old) = peers.insert(handle.id(), handle.clone()) {
            tracing::info!(
                peer_id = %old.id(),
                name = %old.name(),
                "peer reconnecting, replacing old handle"
            );
        } else {
            tracing::info!(peer_id = %handle.id(), name = %handle.name(), "peer connected");
        }

        handle
    }

    pub fn disconnect_peer(&self, id: impl Into<PeerId>) -> bool {
        let id = id.into();
        let removed = self.peers.write().remove(&id);
        if let Some(handle) = &removed {
            tracing::info!(peer_id = %id, name = %handle.name(), "peer disconnected");
        }
        removed.is_some()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().clone()
    }

    pub fn sent_to(&self, peer: PeerId) -> Vec<SentMessage> {
        self.outbox
            .lock()
            .iter()
            .filter(|msg| msg.target == Some(peer))
            .cloned()
            .collect()
    }

    /// Drain the outbox, e.g. to replay it into the other side's inbox.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.outbox.lock())
    }

    pub fn cell_count(&self) -> usize {
        self.cells.read().len()
    }
}

impl PeerDirectory for MemoryHost {
    fn resolve(&self, id: PeerId) -> Option<PeerHandle> {
        self.peers.read().get(&id).cloned()
    }

    fn peers(&self) -> Vec<PeerHandle> {
        self.peers.read().values().cloned().collect()
    }
}

impl ServerTransport for MemoryHost {
    fn trigger_client(&self, peer: &PeerHandle, channel: &str, args: Vec<Value>) {
        self.outbox.lock().push(SentMessage {
            target: Some(peer.id()),
            channel: channel.to_string(),
            args,
        });
    }
}

impl ClientTransport for MemoryHost {
    fn trigger_server(&self, channel: &str, args: Vec<Value>) {
        self.outbox.lock().push(SentMessage {
            target: None,
            channel: channel.to_string(),
            args,
        });
    }
}

impl KvpStore for MemoryHost {
    fn get_string(&self, key: &str) -> Option<String> {
        self.cells.read().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: String) {
        self.cells.write().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.cells.write().remove(key);
    }
}
