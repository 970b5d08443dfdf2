//! Pluggable units of behaviour and the registry that owns them.

mod registry;

pub use registry::{ModuleRegistry, ModuleRegistryBuilder, StartReport};

/// A named, disposable unit of behaviour.
///
/// `name` must be stable across restarts: it is the storage namespace of the
/// module.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Release what the module holds. Called exactly once, at stop.
    ///
    /// Subscriptions made at construction stay registered unless the module
    /// unsubscribes them here.
    fn dispose(&mut self);
}

/// How the registry builds a module from the side's context `C`.
pub trait ModuleConstructor<C>: Module + Sized + 'static {
    fn construct(ctx: &C) -> anyhow::Result<Self>;
}
