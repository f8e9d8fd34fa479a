//! Ring Setup
//!
//! Leader-driven construction of the ring. A setup is first *accepted*
//! (preconditions checked, leader recorded in the in-progress guard), then
//! built (members sampled, adjacency linked, states committed) and finally
//! *finalized* (guard verified and released).
//!
//! ```text
//! accept_setup ──► select_members ──► commit_ring ──► finalize_setup
//!   (steps 1-5)      (steps 6-7)       (steps 8-9)      (step 10)
//!                        │
//!                        └─ InsufficientFreePeers / RingAlreadyActive:
//!                           guard rolled back, no peer touched
//! ```

use crate::error::SetupError;
use crate::manager::{Outcome, RingManager};
use crate::peer::{InvalidTransition, PeerState, Transition};
use crate::ring::{Ring, MIN_RING_SIZE};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Leaders whose setup was accepted but not yet finalized.
#[derive(Debug, Default)]
pub struct SetupInProgress {
    leaders: HashSet<String>,
}

impl SetupInProgress {
    pub fn contains(&self, leader: &str) -> bool {
        self.leaders.contains(leader)
    }

    pub(crate) fn insert(&mut self, leader: &str) -> bool {
        self.leaders.insert(leader.to_string())
    }

    pub(crate) fn remove(&mut self, leader: &str) -> bool {
        self.leaders.remove(leader)
    }

    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.leaders.iter().map(String::as_str)
    }
}

impl RingManager {
    /// Build a ring of `size` peers led by `leader`.
    ///
    /// On success every member receives an `Assigned` notification carrying
    /// its position and right neighbor.
    pub fn setup(&mut self, leader: &str, size: usize) -> Result<Outcome<Ring>, SetupError> {
        self.accept_setup(leader, size)?;

        let members = match self.select_members(leader, size) {
            Ok(members) => members,
            Err(e) => {
                self.setup_in_progress.remove(leader);
                return Err(e);
            }
        };

        if let Err(e) = self.commit_ring(members) {
            // Nothing was mutated, so the guard can be released
            self.setup_in_progress.remove(leader);
            return Err(e.into());
        }

        let ring = self.finalize_setup(leader)?;
        let notifications = (0..ring.len())
            .filter_map(|position| self.assignment(&ring, position))
            .collect();

        info!(
            leader = %leader,
            size = ring.len(),
            members = ?ring.members(),
            "Ring formed"
        );
        Ok(Outcome::new(ring, notifications))
    }

    /// Steps 1-5: validate preconditions and take the in-progress guard.
    pub(crate) fn accept_setup(&mut self, leader: &str, size: usize) -> Result<(), SetupError> {
        let peer = self
            .registry
            .lookup(leader)
            .ok_or_else(|| SetupError::UnknownLeader(leader.to_string()))?;

        if !peer.is_free() {
            return Err(SetupError::LeaderNotFree {
                leader: leader.to_string(),
                state: peer.state,
            });
        }

        let registered = self.registry.len();
        if size < MIN_RING_SIZE || size > registered {
            return Err(SetupError::InvalidSize {
                requested: size,
                registered,
            });
        }

        if self.setup_in_progress.contains(leader) {
            return Err(SetupError::SetupAlreadyInProgress(leader.to_string()));
        }

        self.setup_in_progress.insert(leader);
        debug!(leader = %leader, size = size, "Setup accepted");
        Ok(())
    }

    /// Steps 6-7: sample `size - 1` free peers uniformly without replacement.
    ///
    /// Only one ring may be active; that is checked once enough free peers
    /// are known to exist.
    fn select_members(&mut self, leader: &str, size: usize) -> Result<Vec<String>, SetupError> {
        let free = self.registry.free_peers_excluding(leader);
        let needed = size - 1;
        if free.len() < needed {
            return Err(SetupError::InsufficientFreePeers {
                needed,
                available: free.len(),
            });
        }

        if let Some(ring) = &self.ring {
            return Err(SetupError::RingAlreadyActive {
                leader: ring.leader().to_string(),
            });
        }

        let mut members = Vec::with_capacity(size);
        members.push(leader.to_string());
        members.extend(free.choose_multiple(&mut self.rng, needed).cloned());
        Ok(members)
    }

    /// Steps 8-9: commit states and link each member to the next position.
    fn commit_ring(&mut self, members: Vec<String>) -> Result<(), InvalidTransition> {
        let changes: Vec<(String, Transition)> = members
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let transition = if i == 0 {
                    Transition::ElectedLeader
                } else {
                    Transition::Selected
                };
                (name.clone(), transition)
            })
            .collect();
        self.commit_transitions(&changes)?;

        let ring = Ring::new(members);
        for (i, name) in ring.members().iter().enumerate() {
            self.set_right_neighbor(name, Some(ring.successor(i).to_string()));
        }
        self.ring = Some(ring);
        Ok(())
    }

    /// Step 10: confirm the leader committed and release the guard.
    ///
    /// A mismatch keeps the guard entry in place for inspection.
    pub(crate) fn finalize_setup(&mut self, leader: &str) -> Result<Ring, SetupError> {
        let leader_committed = self
            .registry
            .lookup(leader)
            .map(|peer| peer.state == PeerState::Leader)
            .unwrap_or(false);
        let ring = self.ring.as_ref().filter(|ring| ring.leader() == leader);

        match ring {
            Some(ring) if leader_committed && self.setup_in_progress.contains(leader) => {
                let ring = ring.clone();
                self.setup_in_progress.remove(leader);
                Ok(ring)
            }
            _ => {
                error!(
                    leader = %leader,
                    leader_committed = leader_committed,
                    guard_held = self.setup_in_progress.contains(leader),
                    "Setup finalization found inconsistent state"
                );
                Err(SetupError::ConsistencyViolation(leader.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::test_support::{manager_with_peers, state_of};
    use crate::notification::NotificationKind;
    use std::collections::HashSet;

    #[test]
    fn test_setup_builds_closed_ring() {
        let mut manager = manager_with_peers(6, 42);
        let outcome = manager.setup("Peer1", 4).unwrap();
        let ring = outcome.value;

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.leader(), "Peer1");
        assert_eq!(state_of(&manager, "Peer1"), PeerState::Leader);
        for member in &ring.members()[1..] {
            assert_eq!(state_of(&manager, member), PeerState::InDht);
        }
        assert_eq!(manager.registry().follow_neighbors("Peer1", 4), Some("Peer1"));
        assert!(ring.is_closed_cycle(manager.registry()));
        assert!(manager.setup_in_progress().is_empty());

        assert_eq!(outcome.notifications.len(), 4);
        for notification in &outcome.notifications {
            match &notification.kind {
                NotificationKind::Assigned {
                    position,
                    size,
                    right_neighbor,
                    ..
                } => {
                    assert_eq!(*size, 4);
                    assert_eq!(ring.members()[*position], notification.recipient);
                    assert_eq!(ring.successor(*position), right_neighbor);
                }
                other => panic!("unexpected notification {other:?}"),
            }
        }
    }

    #[test]
    fn test_selection_size_and_uniqueness_over_many_trials() {
        let mut seen_members = HashSet::new();
        for seed in 0..200 {
            let mut manager = manager_with_peers(8, seed);
            let ring = manager.setup("Peer3", 5).unwrap().value;

            let unique: HashSet<_> = ring.members().iter().collect();
            assert_eq!(unique.len(), 5);
            assert_eq!(ring.members()[0], "Peer3");
            assert!(ring.is_closed_cycle(manager.registry()));
            assert_eq!(manager.registry().count_in_state(PeerState::Leader), 1);
            assert_eq!(manager.registry().count_in_state(PeerState::InDht), 4);
            seen_members.extend(ring.members()[1..].iter().cloned());
        }
        // Every non-leader is eventually picked
        assert_eq!(seen_members.len(), 7);
    }

    #[test]
    fn test_same_seed_same_selection() {
        let mut a = manager_with_peers(10, 99);
        let mut b = manager_with_peers(10, 99);
        assert_eq!(a.setup("Peer1", 5).unwrap().value, b.setup("Peer1", 5).unwrap().value);
    }

    #[test]
    fn test_size_below_minimum_always_invalid() {
        for n in 0..3 {
            let mut manager = manager_with_peers(5, 1);
            assert!(matches!(
                manager.setup("Peer1", n),
                Err(SetupError::InvalidSize { requested, .. }) if requested == n
            ));
            assert!(manager.setup_in_progress().is_empty());
        }
    }

    #[test]
    fn test_size_above_registry_is_invalid() {
        let mut manager = manager_with_peers(2, 1);
        assert_eq!(
            manager.setup("Peer1", 3).unwrap_err(),
            SetupError::InvalidSize {
                requested: 3,
                registered: 2
            }
        );
        assert_eq!(manager.count_free(), 2);
        assert!(manager.active_ring().is_none());
    }

    #[test]
    fn test_unknown_and_busy_leader() {
        let mut manager = manager_with_peers(4, 1);
        assert_eq!(
            manager.setup("ghost", 3).unwrap_err(),
            SetupError::UnknownLeader("ghost".to_string())
        );

        let ring = manager.setup("Peer1", 3).unwrap().value;
        let member = ring.members()[1].clone();
        assert!(matches!(
            manager.setup(&member, 3),
            Err(SetupError::LeaderNotFree { state: PeerState::InDht, .. })
        ));
    }

    #[test]
    fn test_attempt_while_accepted_is_rejected() {
        let mut manager = manager_with_peers(5, 1);
        manager.accept_setup("Peer1", 3).unwrap();

        assert_eq!(
            manager.setup("Peer1", 3).unwrap_err(),
            SetupError::SetupAlreadyInProgress("Peer1".to_string())
        );
        assert_eq!(manager.count_free(), 5);
    }

    #[test]
    fn test_second_ring_rejected_while_active() {
        let mut manager = manager_with_peers(7, 1);
        manager.setup("Peer1", 3).unwrap();
        let free = manager.registry().free_peers_excluding("");
        assert!(matches!(
            manager.setup(&free[0], 3),
            Err(SetupError::RingAlreadyActive { leader }) if leader == "Peer1"
        ));
        assert!(!manager.setup_in_progress().contains(&free[0]));
    }

    #[test]
    fn test_insufficient_free_peers_rolls_back() {
        let mut manager = manager_with_peers(5, 1);
        manager.setup("Peer1", 3).unwrap();

        let free = manager.registry().free_peers_excluding("");
        assert_eq!(free.len(), 2);
        let states_before: Vec<_> = manager
            .registry()
            .iter()
            .map(|peer| (peer.name.clone(), peer.state, peer.right_neighbor.clone()))
            .collect();

        assert_eq!(
            manager.setup(&free[0], 3).unwrap_err(),
            SetupError::InsufficientFreePeers {
                needed: 2,
                available: 1
            }
        );
        assert!(!manager.setup_in_progress().contains(&free[0]));
        for (name, state, neighbor) in states_before {
            let peer = manager.lookup(&name).unwrap();
            assert_eq!(peer.state, state);
            assert_eq!(peer.right_neighbor, neighbor);
        }
        assert_eq!(manager.active_ring().unwrap().leader(), "Peer1");
    }

    #[test]
    fn test_finalize_without_commit_is_consistency_violation() {
        let mut manager = manager_with_peers(4, 1);
        manager.accept_setup("Peer1", 3).unwrap();

        assert_eq!(
            manager.finalize_setup("Peer1").unwrap_err(),
            SetupError::ConsistencyViolation("Peer1".to_string())
        );
        // Guard entry stays for inspection
        assert!(manager.setup_in_progress().contains("Peer1"));
        assert_eq!(manager.setup_in_progress().iter().collect::<Vec<_>>(), vec!["Peer1"]);
    }
}
