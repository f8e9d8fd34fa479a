//! Peer Registry
//!
//! Owns every peer record known to the manager. Ring adjacency is stored
//! as neighbor names inside these records, never as shared references.

use crate::error::RegistryError;
use crate::peer::{Peer, PeerAddress, PeerState};
use std::collections::{hash_map::Entry, HashMap};
use tracing::debug;

#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<String, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `Free` peer.
    ///
    /// Fails without touching existing state if the name is taken.
    pub fn register(&mut self, name: &str, address: PeerAddress) -> Result<(), RegistryError> {
        if let Entry::Vacant(e) = self.peers.entry(name.to_string()) {
            debug!(peer = %name, address = %address, "Adding peer to registry");
            e.insert(Peer::new(name, address));
            Ok(())
        } else {
            Err(RegistryError::AlreadyRegistered(name.to_string()))
        }
    }

    /// Remove a peer record outright. Ring bookkeeping is the caller's job.
    pub(crate) fn remove(&mut self, name: &str) -> Result<Peer, RegistryError> {
        self.peers
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<&Peer> {
        self.peers.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Peer> {
        self.peers.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    pub fn count_free(&self) -> usize {
        self.peers.values().filter(|peer| peer.is_free()).count()
    }

    pub fn count_in_state(&self, state: PeerState) -> usize {
        self.peers.values().filter(|peer| peer.state == state).count()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Names of all `Free` peers other than `excluded`, sorted so that a
    /// seeded selection is reproducible.
    pub fn free_peers_excluding(&self, excluded: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .peers
            .values()
            .filter(|peer| peer.is_free() && peer.name != excluded)
            .map(|peer| peer.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Follow right-neighbor links `steps` times starting at `start`.
    ///
    /// Returns `None` if the chain breaks before completing.
    pub fn follow_neighbors(&self, start: &str, steps: usize) -> Option<&str> {
        let mut current = self.peers.get(start)?;
        for _ in 0..steps {
            let next = current.right_neighbor.as_deref()?;
            current = self.peers.get(next)?;
        }
        Some(current.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> PeerAddress {
        PeerAddress::new(Ipv4Addr::LOCALHOST, port, port + 1)
    }

    #[test]
    fn test_register_twice_fails_without_side_effects() {
        let mut registry = PeerRegistry::new();
        assert!(registry.register("Peer1", addr(44001)).is_ok());
        assert_eq!(
            registry.register("Peer1", addr(45001)),
            Err(RegistryError::AlreadyRegistered("Peer1".to_string()))
        );

        assert_eq!(registry.len(), 1);
        // Original address survives the rejected registration
        assert_eq!(registry.lookup("Peer1").unwrap().address, addr(44001));
    }

    #[test]
    fn test_count_free_and_exclusion() {
        let mut registry = PeerRegistry::new();
        for (i, name) in ["Peer3", "Peer1", "Peer2"].iter().enumerate() {
            registry.register(name, addr(44000 + i as u16 * 2)).unwrap();
        }
        registry.get_mut("Peer2").unwrap().state = PeerState::InDht;

        assert_eq!(registry.count_free(), 2);
        assert_eq!(registry.count_in_state(PeerState::InDht), 1);
        assert_eq!(registry.free_peers_excluding("Peer1"), vec!["Peer3".to_string()]);
    }

    #[test]
    fn test_remove_unknown_peer() {
        let mut registry = PeerRegistry::new();
        assert_eq!(
            registry.remove("ghost"),
            Err(RegistryError::NotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_follow_neighbors_detects_broken_chain() {
        let mut registry = PeerRegistry::new();
        registry.register("a", addr(1000)).unwrap();
        registry.register("b", addr(1002)).unwrap();
        registry.get_mut("a").unwrap().right_neighbor = Some("b".to_string());
        registry.get_mut("b").unwrap().right_neighbor = Some("a".to_string());

        assert_eq!(registry.follow_neighbors("a", 2), Some("a"));
        assert_eq!(registry.follow_neighbors("a", 1), Some("b"));

        registry.get_mut("b").unwrap().right_neighbor = Some("gone".to_string());
        assert_eq!(registry.follow_neighbors("a", 2), None);
    }
}
