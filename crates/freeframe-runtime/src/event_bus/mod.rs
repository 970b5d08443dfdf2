//! Publish/subscribe on both process sides.
//!
//! Each side owns one [`Dispatcher`]. Every bus of that side enqueues its
//! deliveries there, so `publish` never runs a callback inline and callbacks
//! of one side never overlap.
//!
//! | bus | scope | addressing |
//! |-----|-------|------------|
//! | [`EventBus`] | same side | type |
//! | [`RawEventBus`] | same side | channel string |
//! | [`ServerNetworkEventBus`] / [`ClientNetworkEventBus`] | across the network | type |
//! | [`ServerRawNetworkEventBus`] / [`ClientRawNetworkEventBus`] | across the network | channel string |

mod dispatcher;
mod inbox;
mod local;
mod network;
mod raw;
mod subscription;

pub use dispatcher::Dispatcher;
pub use inbox::NetworkInbox;
pub use local::EventBus;
pub use network::{
    ClientNetworkEventBus, ClientRawNetworkEventBus, ServerNetworkEventBus,
    ServerRawNetworkEventBus,
};
pub use raw::RawEventBus;
pub use subscription::Subscription;
