//! Coordinator Message Types
//!
//! One message per manager operation. Mutating messages reply with the
//! core `Result`, so a rejected request surfaces as a handler error on the
//! asking side.

use kameo::Reply;
use ringmesh_core::{Peer, PeerAddress};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct RegisterPeer {
    pub name: String,
    pub address: PeerAddress,
}

/// Remove a peer, detaching it from the ring first if needed.
#[derive(Debug, Clone)]
pub struct DeregisterPeer {
    pub name: String,
}

/// Form a ring of `size` members led by `leader`.
#[derive(Debug, Clone)]
pub struct SetupDht {
    pub leader: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct JoinDht {
    pub peer: String,
}

#[derive(Debug, Clone)]
pub struct LeaveDht {
    pub peer: String,
}

#[derive(Debug, Clone)]
pub struct TeardownDht {
    pub leader: String,
}

/// Find the ring member responsible for an event on behalf of a free peer.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub peer: String,
    pub event_id: String,
}

/// Read-only lookup of a single peer record.
#[derive(Debug, Clone)]
pub struct LookupPeer {
    pub name: String,
}

#[derive(Debug, Clone, Reply)]
pub struct PeerLookup {
    pub peer: Option<Peer>,
}

#[derive(Debug, Clone)]
pub struct GetRegistryStats;

/// Snapshot of registry and ring counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Reply)]
pub struct RegistryStats {
    pub registered: usize,
    pub free: usize,
    /// 0 when no ring is active
    pub ring_size: usize,
    pub ring_leader: Option<String>,
    pub setups_in_progress: usize,
}
