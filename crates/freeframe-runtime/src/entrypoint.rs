//! Lifecycle driver of one process side.
//!
//! The host broadcasts start/stop signals for every resource it runs. An
//! entrypoint reacts only to signals carrying its own resource name.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::context::{ClientContext, RuntimeContext, ServerContext};
use crate::module::{ModuleRegistry, StartReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    Start { resource: String },
    Stop { resource: String },
}

impl LifecycleSignal {
    pub fn start(resource: impl Into<String>) -> Self {
        LifecycleSignal::Start {
            resource: resource.into(),
        }
    }

    pub fn stop(resource: impl Into<String>) -> Self {
        LifecycleSignal::Stop {
            resource: resource.into(),
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            LifecycleSignal::Start { resource } | LifecycleSignal::Stop { resource } => resource,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointState {
    Unstarted,
    Running,
    /// Terminal. A restart needs a fresh entrypoint.
    Stopped,
}

pub struct Entrypoint<C: RuntimeContext> {
    context: Arc<C>,
    registry: ModuleRegistry<C>,
    state: EntrypointState,
    last_report: Option<StartReport>,
}

pub type ServerEntrypoint = Entrypoint<ServerContext>;
pub type ClientEntrypoint = Entrypoint<ClientContext>;

impl<C: RuntimeContext> Entrypoint<C> {
    pub fn new(context: Arc<C>, registry: ModuleRegistry<C>) -> Self {
        Self {
            context,
            registry,
            state: EntrypointState::Unstarted,
            last_report: None,
        }
    }

    pub fn state(&self) -> EntrypointState {
        self.state
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn registry(&self) -> &ModuleRegistry<C> {
        &self.registry
    }

    /// Report of the start performed by this entrypoint, if any.
    pub fn last_report(&self) -> Option<&StartReport> {
        self.last_report.as_ref()
    }

    /// Apply one host signal. Returns whether it changed anything.
    pub fn on_signal(&mut self, signal: &LifecycleSignal) -> bool {
        let resource = self.context.resource_name();
        if signal.resource() != resource {
            tracing::debug!(
                resource = %resource,
                signal_resource = %signal.resource(),
                "ignoring lifecycle signal for another resource"
            );
            return false;
        }

        match (signal, self.state) {
            (LifecycleSignal::Start { .. }, EntrypointState::Unstarted) => {
                tracing::info!(resource = %resource, "starting modules");
                let report = self.registry.start(&self.context);
                tracing::info!(
                    resource = %resource,
                    started = report.started.len(),
                    failed = report.failed.len(),
                    "resource running"
                );
                self.last_report = Some(report);
                self.state = EntrypointState::Running;
                true
            }
            (LifecycleSignal::Start { .. }, state) => {
                tracing::warn!(resource = %resource, state = ?state, "start signal ignored");
                false
            }
            (LifecycleSignal::Stop { .. }, EntrypointState::Running) => {
                let disposed = self.registry.stop();
                tracing::info!(resource = %resource, disposed, "resource stopped");
                self.state = EntrypointState::Stopped;
                true
            }
            (LifecycleSignal::Stop { .. }, EntrypointState::Unstarted) => {
                tracing::info!(resource = %resource, "stopped before start");
                self.state = EntrypointState::Stopped;
                true
            }
            (LifecycleSignal::Stop { .. }, EntrypointState::Stopped) => false,
        }
    }

    /// Consume host signals until this resource stops.
    ///
    /// If the signal source closes while modules are running they are
    /// disposed as if a stop had arrived.
    pub async fn run(mut self, mut signals: mpsc::UnboundedReceiver<LifecycleSignal>) -> Self {
        while let Some(signal) = signals.recv().await {
            self.on_signal(&signal);
            if self.state == EntrypointState::Stopped {
                return self;
            }
        }

        if self.state == EntrypointState::Running {
            tracing::warn!(
                resource = %self.context.resource_name(),
                "signal source closed, stopping modules"
            );
            self.registry.stop();
            self.state = EntrypointState::Stopped;
        }
        self
    }
}
