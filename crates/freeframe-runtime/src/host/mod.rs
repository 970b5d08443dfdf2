//! The boundary between the runtime and the host process.
//!
//! The runtime never talks to host natives directly. It consumes these traits:
//!
//! | trait | used by |
//! |-------|---------|
//! | [`PeerDirectory`] | server network buses (resolve / enumerate peers) |
//! | [`ServerTransport`] | server network buses (send to one peer) |
//! | [`ClientTransport`] | client network buses (send to the server) |
//! | [`KvpStore`] | [`KvpStorage`](crate::storage::KvpStorage) |
//!
//! Inbound traffic flows the other way: the host hands every message it
//! receives to the side's [`NetworkInbox`](crate::event_bus::NetworkInbox).

mod memory;

pub use memory::{MemoryHost, SentMessage};

use freeframe_protocol::PeerId;
use serde_json::Value;

/// A live peer as reported by the host's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    id: PeerId,
    name: String,
}

impl PeerHandle {
    pub fn new(id: PeerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub trait PeerDirectory: Send + Sync {
    /// `None` when no peer with this id is connected.
    fn resolve(&self, id: PeerId) -> Option<PeerHandle>;

    /// Every peer connected at the time of the call.
    fn peers(&self) -> Vec<PeerHandle>;
}

pub trait ServerTransport: Send + Sync {
    fn trigger_client(&self, peer: &PeerHandle, channel: &str, args: Vec<Value>);
}

pub trait ClientTransport: Send + Sync {
    fn trigger_server(&self, channel: &str, args: Vec<Value>);
}

/// Persistent string cells owned by the host resource.
pub trait KvpStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn set_string(&self, key: &str, value: String);

    fn delete(&self, key: &str);
}

/// Everything a server-side context needs from its host.
pub trait ServerHost: PeerDirectory + ServerTransport + KvpStore {}

impl<T: PeerDirectory + ServerTransport + KvpStore> ServerHost for T {}

/// Everything a client-side context needs from its host.
pub trait ClientHost: ClientTransport + KvpStore {}

impl<T: ClientTransport + KvpStore> ClientHost for T {}
