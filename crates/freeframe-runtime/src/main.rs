use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use freeframe::event_bus::ServerNetworkEventBus;
use freeframe::host::MemoryHost;
use freeframe::storage::ModuleStorage;
use freeframe::{
    BusObject, LifecycleSignal, Module, ModuleConstructor, ModuleRegistry, PeerId, ServerContext,
    ServerEntrypoint, Settings, Subscription,
};

// ============================================================================
// Demo events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl BusObject for Hello {
    fn namespace() -> String {
        "Demo".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Welcome {
    message: String,
    visits: u32,
}

impl BusObject for Welcome {
    fn namespace() -> String {
        "Demo".to_string()
    }
}

// ============================================================================
// Demo module
// ============================================================================

/// Greets every client that says hello and counts visits per peer.
struct Greeter {
    network: Arc<ServerNetworkEventBus>,
    subscription: Option<Subscription>,
}

impl Greeter {
    fn greet(
        network: &ServerNetworkEventBus,
        storage: &ModuleStorage,
        peer: PeerId,
        hello: Hello,
    ) -> anyhow::Result<()> {
        let key = format!("visits/{}", peer);
        let visits = storage.load_or(&key, 0u32)? + 1;
        storage.save(&key, &visits)?;

        network.publish_to(
            peer,
            &Welcome {
                message: format!("welcome, {}", hello.name),
                visits,
            },
        )?;
        Ok(())
    }
}

impl Module for Greeter {
    fn name(&self) -> &str {
        "Greeter"
    }

    fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.network.unsubscribe(&subscription);
        }
    }
}

impl ModuleConstructor<ServerContext> for Greeter {
    fn construct(ctx: &ServerContext) -> anyhow::Result<Self> {
        let network = ctx.network.clone();
        let storage = ctx.storage.scoped("Greeter");

        let replies = network.clone();
        let subscription = network.subscribe(move |peer: PeerId, hello: Hello| {
            if let Err(e) = Greeter::greet(&replies, &storage, peer, hello) {
                tracing::warn!(peer_id = %peer, error = %e, "could not greet peer");
            }
        });

        Ok(Self {
            network,
            subscription: Some(subscription),
        })
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .init();

    info!(resource = %settings.resource_name, "Starting freeframe host");

    let host = Arc::new(MemoryHost::new());
    let context = Arc::new(ServerContext::bootstrap(&settings, host.clone()).await?);
    let registry = ModuleRegistry::<ServerContext>::builder()
        .module::<Greeter>()
        .build();

    let mut entrypoint = ServerEntrypoint::new(context.clone(), registry);
    entrypoint.on_signal(&LifecycleSignal::start(&settings.resource_name));

    let ann = host.connect_peer(1u32, "ann");
    let bob = host.connect_peer(2u32, "bob");

    // Simulated client traffic; bob says hello twice.
    for (peer, name) in [(&ann, "ann"), (&bob, "bob"), (&bob, "bob")] {
        let hello = Hello {
            name: name.to_string(),
        };
        context
            .inbox
            .receive(Some(peer.id()), &Hello::channel(), vec![serde_json::to_value(&hello)?]);
    }
    context.dispatcher.settle().await;

    for message in host.take_sent() {
        info!(
            target_peer = ?message.target,
            channel = %message.channel,
            payload = %serde_json::Value::Array(message.args),
            "outbound"
        );
    }

    // The stop arrives the way a host delivers it: through the signal loop.
    let (signals, signal_rx) = mpsc::unbounded_channel();
    signals.send(LifecycleSignal::start("some-other-resource"))?;
    signals.send(LifecycleSignal::stop(&settings.resource_name))?;
    let entrypoint = entrypoint.run(signal_rx).await;
    info!(state = ?entrypoint.state(), "Host shutdown complete");

    Ok(())
}
