//! Event channel naming.
//!
//! Typed buses never take a channel string from the caller. The channel is
//! derived from the event type's identity, so the publishing and subscribing
//! sides only have to agree on the Rust type:
//!
//! ```text
//! __FFE:<Namespace>.<TypeName>
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Prefix of every typed event channel.
pub const EVENT_CHANNEL_PREFIX: &str = "__FFE:";

/// Build the channel string for a namespace and simple type name.
pub fn event_channel(namespace: &str, type_name: &str) -> String {
    let mut channel =
        String::with_capacity(EVENT_CHANNEL_PREFIX.len() + namespace.len() + type_name.len() + 1);
    channel.push_str(EVENT_CHANNEL_PREFIX);
    channel.push_str(namespace);
    channel.push('.');
    channel.push_str(type_name);
    channel
}

// ============================================================================
// Type identity
// ============================================================================

/// Namespace and simple name of a Rust type, as used for routing.
///
/// `game::events::PlayerJoined` becomes namespace `game.events` and name
/// `PlayerJoined`. Generic arguments are not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIdentity {
    pub namespace: String,
    pub name: String,
}

impl TypeIdentity {
    pub fn of<T: ?Sized>() -> Self {
        Self::parse(std::any::type_name::<T>())
    }

    pub fn parse(path: &str) -> Self {
        let path = path.split('<').next().unwrap_or(path);
        match path.rsplit_once("::") {
            Some((namespace, name)) => Self {
                namespace: namespace.replace("::", "."),
                name: name.to_string(),
            },
            None => Self {
                namespace: String::new(),
                name: path.to_string(),
            },
        }
    }
}

// ============================================================================
// Bus objects
// ============================================================================

/// A value that can travel over a typed event bus.
///
/// The defaults derive the routing identity from the type's module path.
/// Override [`BusObject::namespace`] or [`BusObject::type_name`] when a channel
/// has to stay stable across a module move, or has to match a peer that was
/// not built from the same source tree.
pub trait BusObject: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn namespace() -> String {
        TypeIdentity::of::<Self>().namespace
    }

    fn type_name() -> String {
        TypeIdentity::of::<Self>().name
    }

    fn channel() -> String {
        event_channel(&Self::namespace(), &Self::type_name())
    }
}
