//! The per-side bundle of services handed to every module constructor.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::event_bus::{
    ClientNetworkEventBus, ClientRawNetworkEventBus, Dispatcher, EventBus, NetworkInbox,
    RawEventBus, ServerNetworkEventBus, ServerRawNetworkEventBus,
};
use crate::host::{ClientHost, ServerHost};
use crate::storage::{PgStorage, Storage};

/// What an [`Entrypoint`](crate::entrypoint::Entrypoint) needs from a context.
pub trait RuntimeContext: Send + Sync + 'static {
    /// Lifecycle signals naming any other resource are ignored.
    fn resource_name(&self) -> &str;
}

// ============================================================================
// Server side
// ============================================================================

pub struct ServerContext {
    resource_name: String,
    pub storage: Storage,
    pub events: Arc<EventBus>,
    pub raw_events: Arc<RawEventBus>,
    pub network: Arc<ServerNetworkEventBus>,
    pub raw_network: Arc<ServerRawNetworkEventBus>,
    /// Hand inbound client messages to this.
    pub inbox: Arc<NetworkInbox>,
    pub dispatcher: Dispatcher,
}

impl ServerContext {
    /// Must be called inside a tokio runtime: the side's dispatcher is
    /// spawned here.
    pub fn new<H: ServerHost + 'static>(
        resource_name: impl Into<String>,
        host: Arc<H>,
        storage: Storage,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::spawn()?;
        let inbox = Arc::new(NetworkInbox::new(dispatcher.clone()));

        Ok(Self {
            resource_name: resource_name.into(),
            storage,
            events: Arc::new(EventBus::new(dispatcher.clone())),
            raw_events: Arc::new(RawEventBus::new(dispatcher.clone())),
            network: Arc::new(ServerNetworkEventBus::new(
                host.clone(),
                host.clone(),
                inbox.clone(),
            )),
            raw_network: Arc::new(ServerRawNetworkEventBus::new(
                host.clone(),
                host,
                inbox.clone(),
            )),
            inbox,
            dispatcher,
        })
    }

    /// Server context storing module data in the host's KVP cells.
    pub fn with_kvp_storage<H: ServerHost + 'static>(
        resource_name: impl Into<String>,
        host: Arc<H>,
    ) -> Result<Self> {
        let storage = Storage::kvp(host.clone());
        Self::new(resource_name, host, storage)
    }

    /// Build the context from settings: PostgreSQL storage when a connection
    /// string is configured, the host's KVP cells otherwise.
    pub async fn bootstrap<H: ServerHost + 'static>(settings: &Settings, host: Arc<H>) -> Result<Self> {
        match settings.database_connection.as_deref() {
            Some(connection) if settings.uses_database() => {
                tracing::info!("module storage: postgres");
                let medium = PgStorage::connect(connection).await?;
                Self::new(&settings.resource_name, host, Storage::new(Arc::new(medium)))
            }
            _ => {
                tracing::info!("module storage: host kvp cells");
                Self::with_kvp_storage(&settings.resource_name, host)
            }
        }
    }
}

impl RuntimeContext for ServerContext {
    fn resource_name(&self) -> &str {
        &self.resource_name
    }
}

// ============================================================================
// Client side
// ============================================================================

pub struct ClientContext {
    resource_name: String,
    pub storage: Storage,
    pub events: Arc<EventBus>,
    pub raw_events: Arc<RawEventBus>,
    pub network: Arc<ClientNetworkEventBus>,
    pub raw_network: Arc<ClientRawNetworkEventBus>,
    /// Hand messages from the server to this.
    pub inbox: Arc<NetworkInbox>,
    pub dispatcher: Dispatcher,
}

impl ClientContext {
    /// Client storage always lives in the host's KVP cells.
    pub fn new<H: ClientHost + 'static>(resource_name: impl Into<String>, host: Arc<H>) -> Result<Self> {
        let dispatcher = Dispatcher::spawn()?;
        let inbox = Arc::new(NetworkInbox::new(dispatcher.clone()));

        Ok(Self {
            resource_name: resource_name.into(),
            storage: Storage::kvp(host.clone()),
            events: Arc::new(EventBus::new(dispatcher.clone())),
            raw_events: Arc::new(RawEventBus::new(dispatcher.clone())),
            network: Arc::new(ClientNetworkEventBus::new(host.clone(), inbox.clone())),
            raw_network: Arc::new(ClientRawNetworkEventBus::new(host, inbox.clone())),
            inbox,
            dispatcher,
        })
    }
}

impl RuntimeContext for ClientContext {
    fn resource_name(&self) -> &str {
        &self.resource_name
    }
}
