//! Ring Topology
//!
//! The canonical ordered membership of the active ring. Position 0 is
//! always the leader; each member's right neighbor is the next position,
//! wrapping back to the leader.

use crate::registry::PeerRegistry;
use serde::{Deserialize, Serialize};

/// Smallest ring the manager will keep alive.
pub const MIN_RING_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    members: Vec<String>,
}

impl Ring {
    /// Build a ring from an ordered member list whose first entry is the leader.
    pub(crate) fn new(members: Vec<String>) -> Self {
        debug_assert!(!members.is_empty());
        Self { members }
    }

    pub fn leader(&self) -> &str {
        &self.members[0]
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|member| member == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member == name)
    }

    /// Member clockwise of `position`.
    pub fn successor(&self, position: usize) -> &str {
        &self.members[(position + 1) % self.members.len()]
    }

    /// Member counter-clockwise of `position`.
    pub fn predecessor(&self, position: usize) -> &str {
        let n = self.members.len();
        &self.members[(position + n - 1) % n]
    }

    pub(crate) fn remove(&mut self, position: usize) -> String {
        self.members.remove(position)
    }

    pub(crate) fn push(&mut self, name: String) {
        self.members.push(name);
    }

    /// Check the cycle invariant against the registry's neighbor links:
    /// from every member, `n` hops return to the same member, and the
    /// first `n` hops from the leader visit members in ring order.
    pub fn is_closed_cycle(&self, registry: &PeerRegistry) -> bool {
        let n = self.members.len();
        let ordered = self.members.iter().enumerate().all(|(i, member)| {
            registry
                .lookup(member)
                .and_then(|peer| peer.right_neighbor.as_deref())
                == Some(self.successor(i))
        });

        ordered
            && self
                .members
                .iter()
                .all(|member| registry.follow_neighbors(member, n) == Some(member.as_str()))
    }
}
