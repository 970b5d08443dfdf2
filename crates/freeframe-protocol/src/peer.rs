use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Host-assigned identifier of a connected peer.
///
/// Ids are small integers handed out by the host. A `PeerId` says nothing
/// about whether the peer is still connected; resolve it against the host's
/// peer directory before addressing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u32);

impl PeerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for PeerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid peer handle: {0:?}")]
pub struct ParsePeerIdError(String);

/// Hosts report the source of an inbound message as a string handle.
impl FromStr for PeerId {
    type Err = ParsePeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ParsePeerIdError(s.to_string()))
    }
}
