//! freeframe: a module runtime for split client/server hosts.
//!
//! A host process embeds one [`Entrypoint`] per side. On a matching start
//! signal it constructs every registered [`Module`] with the side's context
//! (typed and raw event buses, network buses, module storage); on stop it
//! disposes them again.
//!
//! The runtime talks to the host only through the traits in [`host`].

pub mod config;
pub mod context;
pub mod entrypoint;
pub mod error;
pub mod event_bus;
pub mod host;
pub mod module;
pub mod storage;

pub use freeframe_protocol::{BinaryReader, BinarySerializable, BinaryWriter, BusObject, DecodeError, PeerId};

pub use crate::config::Settings;
pub use context::{ClientContext, RuntimeContext, ServerContext};
pub use entrypoint::{ClientEntrypoint, Entrypoint, EntrypointState, LifecycleSignal, ServerEntrypoint};
pub use error::{FrameworkError, Result};
pub use event_bus::Subscription;
pub use module::{Module, ModuleConstructor, ModuleRegistry, StartReport};
pub use storage::{ModuleStorage, Storage};

/// Version component of KVP storage paths.
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");
