//! Query Routing
//!
//! Maps an event id to the ring member responsible for it. The ring itself
//! owns no key space, so ownership is decided by a pluggable
//! [`ResponsibleNode`] strategy over the current membership.
//!
//! The default strategy is rendezvous hashing (highest random weight):
//! every member scores `hash(event, member)` and the highest score wins.
//! Removing a member only moves the events it owned.

use crate::error::QueryError;
use crate::manager::RingManager;
use crate::peer::PeerAddress;
use crate::ring::Ring;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Strategy deciding which ring member answers a query.
pub trait ResponsibleNode {
    fn find_responsible_node(&self, ring: &Ring, event_id: &str) -> Option<String>;
}

/// Highest-random-weight ownership over ring members.
#[derive(Debug, Clone, Copy, Default)]
pub struct RendezvousRouter;

impl RendezvousRouter {
    fn score(event_id: &str, member: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        event_id.hash(&mut hasher);
        member.hash(&mut hasher);
        hasher.finish()
    }
}

impl ResponsibleNode for RendezvousRouter {
    fn find_responsible_node(&self, ring: &Ring, event_id: &str) -> Option<String> {
        ring.members()
            .iter()
            .max_by(|a, b| {
                Self::score(event_id, a)
                    .cmp(&Self::score(event_id, b))
                    .then_with(|| b.cmp(a))
            })
            .cloned()
    }
}

/// Where a query from `from` should be forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRoute {
    pub from: String,
    pub to: String,
    pub to_address: PeerAddress,
    pub event_id: String,
}

impl RingManager {
    /// Resolve the member responsible for `event_id`.
    ///
    /// Only peers outside the ring may query it; members answer queries.
    pub fn route_query(
        &self,
        peer: &str,
        event_id: &str,
        router: &impl ResponsibleNode,
    ) -> Result<QueryRoute, QueryError> {
        let requester = self
            .registry
            .lookup(peer)
            .ok_or_else(|| QueryError::UnknownPeer(peer.to_string()))?;
        let ring = self.ring.as_ref().ok_or(QueryError::NoActiveRing)?;
        if !requester.is_free() {
            return Err(QueryError::PeerNotFree {
                peer: peer.to_string(),
                state: requester.state,
            });
        }

        let to = router
            .find_responsible_node(ring, event_id)
            .ok_or_else(|| QueryError::NoResponsibleNode(event_id.to_string()))?;
        let to_address = self
            .registry
            .lookup(&to)
            .map(|member| member.address)
            .ok_or_else(|| QueryError::NoResponsibleNode(event_id.to_string()))?;

        debug!(peer = %peer, event_id = %event_id, responsible = %to, "Query routed");
        Ok(QueryRoute {
            from: peer.to_string(),
            to,
            to_address,
            event_id: event_id.to_string(),
        })
    }
}
