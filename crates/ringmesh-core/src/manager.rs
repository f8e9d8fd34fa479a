//! Ring Manager
//!
//! Explicitly constructed coordinator state: the peer registry, the single
//! active ring record and the setup-in-progress guard. All operations take
//! `&mut self`, so whoever owns the manager provides the mutual exclusion
//! domain (in the server, a single actor).
//!
//! Setup lives in `setup.rs`, join/leave/teardown in `membership.rs` and
//! query routing in `routing.rs`; this file holds registration and the
//! shared helpers they build on.

use crate::error::RegistryError;
use crate::notification::{Notification, NotificationKind};
use crate::peer::{InvalidTransition, Peer, PeerAddress, PeerState, Transition};
use crate::registry::PeerRegistry;
use crate::ring::Ring;
use crate::setup::SetupInProgress;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

/// Result of a committed operation together with the notifications the
/// caller must deliver once it has released the coordinator.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, notifications: Vec<Notification>) -> Self {
        Self {
            value,
            notifications,
        }
    }

    pub fn quiet(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

/// Point-in-time counters describing the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerStats {
    pub registered: usize,
    pub free: usize,
    pub ring_size: usize,
    pub setups_in_progress: usize,
}

pub struct RingManager {
    pub(crate) registry: PeerRegistry,
    pub(crate) ring: Option<Ring>,
    pub(crate) setup_in_progress: SetupInProgress,
    pub(crate) rng: StdRng,
}

impl Default for RingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RingManager {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Manager whose member selection is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            registry: PeerRegistry::new(),
            ring: None,
            setup_in_progress: SetupInProgress::default(),
            rng,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn active_ring(&self) -> Option<&Ring> {
        self.ring.as_ref()
    }

    pub fn setup_in_progress(&self) -> &SetupInProgress {
        &self.setup_in_progress
    }

    pub fn lookup(&self, name: &str) -> Option<&Peer> {
        self.registry.lookup(name)
    }

    pub fn count_free(&self) -> usize {
        self.registry.count_free()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            registered: self.registry.len(),
            free: self.registry.count_free(),
            ring_size: self.ring.as_ref().map(Ring::len).unwrap_or(0),
            setups_in_progress: self.setup_in_progress.len(),
        }
    }

    pub fn register(&mut self, name: &str, address: PeerAddress) -> Result<(), RegistryError> {
        self.registry.register(name, address)?;
        info!(peer = %name, address = %address, "Peer registered");
        Ok(())
    }

    /// Remove a peer, first detaching it from the active ring.
    ///
    /// A leader forces a teardown; a plain member leaves so the cycle stays
    /// closed. Removal itself is unconditional once the name is known.
    pub fn deregister(&mut self, name: &str) -> Result<Outcome<Peer>, RegistryError> {
        let state = self
            .registry
            .lookup(name)
            .map(|peer| peer.state)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let notifications = match state {
            PeerState::Leader => match self.teardown(name) {
                Ok(outcome) => outcome.notifications,
                Err(e) => {
                    warn!(peer = %name, error = %e, "Forced teardown failed, removing anyway");
                    Vec::new()
                }
            },
            PeerState::InDht => match self.leave(name) {
                Ok(outcome) => outcome.notifications,
                Err(e) => {
                    warn!(peer = %name, error = %e, "Forced leave failed, removing anyway");
                    Vec::new()
                }
            },
            PeerState::Free => Vec::new(),
        };

        let peer = self.registry.remove(name)?;
        info!(peer = %name, "Peer deregistered");
        Ok(Outcome::new(peer, notifications))
    }

    /// Validate every transition first, then apply them all.
    ///
    /// Either all peers move or none do.
    pub(crate) fn commit_transitions(
        &mut self,
        changes: &[(String, Transition)],
    ) -> Result<(), InvalidTransition> {
        let mut resolved = Vec::with_capacity(changes.len());
        for (name, transition) in changes {
            let Some(peer) = self.registry.lookup(name) else {
                warn!(peer = %name, "Transition for unknown peer skipped");
                continue;
            };
            resolved.push((name, peer.state.apply(*transition)?));
        }

        for (name, state) in resolved {
            if let Some(peer) = self.registry.get_mut(name) {
                debug!(peer = %name, from = %peer.state, to = %state, "Peer state transition");
                peer.state = state;
            }
        }
        Ok(())
    }

    pub(crate) fn set_right_neighbor(&mut self, name: &str, neighbor: Option<String>) {
        if let Some(peer) = self.registry.get_mut(name) {
            peer.right_neighbor = neighbor;
        }
    }

    pub(crate) fn notification(&self, recipient: &str, kind: NotificationKind) -> Option<Notification> {
        self.registry.lookup(recipient).map(|peer| Notification {
            recipient: recipient.to_string(),
            address: peer.address,
            kind,
        })
    }

    /// Placement notice for the member at `position` of `ring`.
    pub(crate) fn assignment(&self, ring: &Ring, position: usize) -> Option<Notification> {
        let right_neighbor = ring.successor(position);
        let right_address = self.registry.lookup(right_neighbor)?.address;
        self.notification(
            &ring.members()[position],
            NotificationKind::Assigned {
                leader: ring.leader().to_string(),
                position,
                size: ring.len(),
                right_neighbor: right_neighbor.to_string(),
                right_address,
            },
        )
    }
}
