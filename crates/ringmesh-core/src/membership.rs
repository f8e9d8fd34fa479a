//! Ring Membership
//!
//! Join, leave and teardown of the active ring. Each operation validates
//! its preconditions, commits state transitions atomically, relinks right
//! neighbors so the cycle stays closed, and returns the notifications owed
//! to the affected members.

use crate::error::{JoinError, LeaveError, TeardownError};
use crate::manager::{Outcome, RingManager};
use crate::notification::{Notification, NotificationKind};
use crate::peer::Transition;
use crate::ring::{Ring, MIN_RING_SIZE};
use tracing::info;

/// What remained of the ring after a member left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The ring lives on with the predecessor linked to the successor
    Relinked(Ring),
    /// The ring fell below the minimum size and was dissolved
    Dissolved,
}

impl RingManager {
    /// Append a free peer after the current tail.
    ///
    /// The newcomer takes over the tail's closing link back to the leader.
    pub fn join(&mut self, name: &str) -> Result<Outcome<Ring>, JoinError> {
        let ring = self.ring.as_ref().ok_or(JoinError::NoActiveRing)?;
        let peer = self
            .registry
            .lookup(name)
            .ok_or_else(|| JoinError::UnknownPeer(name.to_string()))?;
        if !peer.is_free() {
            return Err(JoinError::PeerNotFree {
                peer: name.to_string(),
                state: peer.state,
            });
        }

        let tail = ring.members()[ring.len() - 1].clone();
        let closing = self
            .registry
            .lookup(&tail)
            .and_then(|peer| peer.right_neighbor.clone())
            .unwrap_or_else(|| ring.leader().to_string());

        self.commit_transitions(&[(name.to_string(), Transition::Selected)])?;
        self.set_right_neighbor(name, Some(closing));
        self.set_right_neighbor(&tail, Some(name.to_string()));

        let ring = match self.ring.as_mut() {
            Some(ring) => {
                ring.push(name.to_string());
                ring.clone()
            }
            None => return Err(JoinError::NoActiveRing),
        };

        let mut notifications = self.refresh_all(&ring, Some(name));
        notifications.extend(self.assignment(&ring, ring.len() - 1));

        info!(peer = %name, leader = %ring.leader(), size = ring.len(), "Peer joined ring");
        Ok(Outcome::new(ring, notifications))
    }

    /// Remove a non-leader member, linking its predecessor to its successor.
    ///
    /// If fewer than the minimum members would remain the ring is
    /// dissolved and every remaining member is told to tear down.
    pub fn leave(&mut self, name: &str) -> Result<Outcome<LeaveOutcome>, LeaveError> {
        if !self.registry.contains(name) {
            return Err(LeaveError::UnknownPeer(name.to_string()));
        }
        let ring = self.ring.as_ref().ok_or(LeaveError::NoActiveRing)?;
        let position = ring.position(name).ok_or(LeaveError::NoActiveRing)?;
        if position == 0 {
            return Err(LeaveError::LeaderCannotLeave(name.to_string()));
        }

        if ring.len() - 1 < MIN_RING_SIZE {
            let ring = ring.clone();
            let mut changes = vec![(name.to_string(), Transition::Left)];
            changes.extend(
                ring.members()
                    .iter()
                    .filter(|member| *member != name)
                    .map(|member| (member.clone(), Transition::TornDown)),
            );
            self.commit_transitions(&changes)?;

            let notifications = self.teardown_all(&ring, Some(name));
            self.dissolve(&ring);
            info!(
                peer = %name,
                leader = %ring.leader(),
                "Peer left, ring below minimum size dissolved"
            );
            return Ok(Outcome::new(LeaveOutcome::Dissolved, notifications));
        }

        let predecessor = ring.predecessor(position).to_string();
        let successor = ring.successor(position).to_string();

        self.commit_transitions(&[(name.to_string(), Transition::Left)])?;
        self.set_right_neighbor(&predecessor, Some(successor));
        self.set_right_neighbor(name, None);

        let ring = match self.ring.as_mut() {
            Some(ring) => {
                ring.remove(position);
                ring.clone()
            }
            None => return Err(LeaveError::NoActiveRing),
        };

        let notifications = self.refresh_all(&ring, None);
        info!(peer = %name, leader = %ring.leader(), size = ring.len(), "Peer left ring");
        Ok(Outcome::new(LeaveOutcome::Relinked(ring), notifications))
    }

    /// Dissolve the active ring. Only its leader may do so.
    ///
    /// Every member, the leader included, receives a teardown notice.
    pub fn teardown(&mut self, leader: &str) -> Result<Outcome<Ring>, TeardownError> {
        let ring = self.ring.as_ref().ok_or(TeardownError::NoActiveRing)?;
        if ring.leader() != leader {
            return Err(TeardownError::NotLeader {
                requested: leader.to_string(),
                leader: ring.leader().to_string(),
            });
        }

        let ring = ring.clone();
        let changes: Vec<(String, Transition)> = ring
            .members()
            .iter()
            .map(|member| (member.clone(), Transition::TornDown))
            .collect();
        self.commit_transitions(&changes)?;

        let notifications = self.teardown_all(&ring, None);
        self.dissolve(&ring);
        info!(leader = %leader, size = ring.len(), "Ring torn down");
        Ok(Outcome::new(ring, notifications))
    }

    fn dissolve(&mut self, ring: &Ring) {
        for member in ring.members() {
            self.set_right_neighbor(member, None);
        }
        self.ring = None;
    }

    fn refresh_all(&self, ring: &Ring, skip: Option<&str>) -> Vec<Notification> {
        ring.members()
            .iter()
            .filter(|member| Some(member.as_str()) != skip)
            .filter_map(|member| {
                self.notification(
                    member,
                    NotificationKind::Refresh {
                        leader: ring.leader().to_string(),
                        size: ring.len(),
                    },
                )
            })
            .collect()
    }

    fn teardown_all(&self, ring: &Ring, skip: Option<&str>) -> Vec<Notification> {
        ring.members()
            .iter()
            .filter(|member| Some(member.as_str()) != skip)
            .filter_map(|member| {
                self.notification(
                    member,
                    NotificationKind::Teardown {
                        leader: ring.leader().to_string(),
                    },
                )
            })
            .collect()
    }
}
