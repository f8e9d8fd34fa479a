//! Error Types
//!
//! One error enum per coordinator operation. Every variant is a definitive,
//! locally recovered failure except `ConsistencyViolation`, which signals a
//! broken mutual-exclusion guarantee.

use crate::peer::{InvalidTransition, PeerState};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("peer '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("peer '{0}' is not registered")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("leader '{0}' is not registered")]
    UnknownLeader(String),
    #[error("leader '{leader}' is {state}, not Free")]
    LeaderNotFree { leader: String, state: PeerState },
    #[error("invalid ring size {requested} (minimum 3, {registered} peers registered)")]
    InvalidSize { requested: usize, registered: usize },
    #[error("setup already in progress for leader '{0}'")]
    SetupAlreadyInProgress(String),
    #[error("a ring led by '{leader}' is already active")]
    RingAlreadyActive { leader: String },
    #[error("need {needed} free peers besides the leader, only {available} available")]
    InsufficientFreePeers { needed: usize, available: usize },
    #[error("consistency violation while finalizing setup for '{0}'")]
    ConsistencyViolation(String),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("no active ring")]
    NoActiveRing,
    #[error("peer '{0}' is not registered")]
    UnknownPeer(String),
    #[error("peer '{peer}' is {state}, not Free")]
    PeerNotFree { peer: String, state: PeerState },
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaveError {
    #[error("no active ring")]
    NoActiveRing,
    #[error("peer '{0}' is not registered")]
    UnknownPeer(String),
    #[error("leader '{0}' must tear the ring down instead of leaving")]
    LeaderCannotLeave(String),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeardownError {
    #[error("no active ring")]
    NoActiveRing,
    #[error("'{requested}' is not the ring leader")]
    NotLeader { requested: String, leader: String },
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("no active ring")]
    NoActiveRing,
    #[error("peer '{0}' is not registered")]
    UnknownPeer(String),
    #[error("peer '{peer}' is {state}; only Free peers may query the ring")]
    PeerNotFree { peer: String, state: PeerState },
    #[error("no ring member is responsible for event '{0}'")]
    NoResponsibleNode(String),
}

/// Any failure produced by the ring manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Leave(#[from] LeaveError),
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ManagerError {
    /// Whether the failure indicates corrupted coordinator state rather
    /// than a rejected request.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            ManagerError::Setup(SetupError::ConsistencyViolation(_))
                | ManagerError::Setup(SetupError::Transition(_))
                | ManagerError::Join(JoinError::Transition(_))
                | ManagerError::Leave(LeaveError::Transition(_))
                | ManagerError::Teardown(TeardownError::Transition(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::Transition;

    #[test]
    fn test_error_display() {
        let err = SetupError::InvalidSize {
            requested: 2,
            registered: 5,
        };
        assert!(err.to_string().contains("invalid ring size 2"));

        let err = TeardownError::NotLeader {
            requested: "Peer2".to_string(),
            leader: "Peer1".to_string(),
        };
        assert_eq!(err.to_string(), "'Peer2' is not the ring leader");
    }

    #[test]
    fn test_consistency_violation_classification() {
        let err: ManagerError = SetupError::ConsistencyViolation("Peer1".to_string()).into();
        assert!(err.is_consistency_violation());

        let err: ManagerError = LeaveError::Transition(InvalidTransition {
            from: PeerState::Free,
            transition: Transition::Left,
        })
        .into();
        assert!(err.is_consistency_violation());

        let err: ManagerError = RegistryError::NotFound("Peer9".to_string()).into();
        assert!(!err.is_consistency_violation());
    }
}
