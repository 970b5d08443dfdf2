//! Shared wire contract for freeframe server and client sides.
//!
//! Everything in this crate has to agree byte-for-byte between the two process
//! sides: event channel naming, peer identifiers and the binary layout used by
//! module storage.

pub mod binary;
pub mod channel;
pub mod peer;

pub use binary::{BinaryReader, BinarySerializable, BinaryWriter, DecodeError, from_bytes, to_bytes};
pub use channel::{BusObject, EVENT_CHANNEL_PREFIX, TypeIdentity, event_channel};
pub use peer::{ParsePeerIdError, PeerId};
