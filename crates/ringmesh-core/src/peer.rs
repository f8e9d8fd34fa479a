//! Peer Records and Lifecycle
//!
//! A peer is identified by its unique name and carries the addresses the
//! manager uses to reach it. Its lifecycle state is driven exclusively by
//! ring setup, membership changes and teardown.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Network location of a registered peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub ip: Ipv4Addr,
    /// Port the peer listens on for manager traffic
    pub mgmt_port: u16,
    /// Port the peer listens on for ring (peer-to-peer) traffic
    pub data_port: u16,
}

impl PeerAddress {
    pub fn new(ip: Ipv4Addr, mgmt_port: u16, data_port: u16) -> Self {
        Self {
            ip,
            mgmt_port,
            data_port,
        }
    }

    /// Address responses and notifications are sent to.
    pub fn mgmt_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.mgmt_port))
    }

    /// Address other ring members use to reach this peer.
    pub fn data_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.data_port))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.ip, self.mgmt_port, self.data_port)
    }
}

/// Lifecycle state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    /// Registered, not part of any ring
    Free,
    /// Coordinating the ring it formed
    Leader,
    /// Non-leader ring member
    #[serde(rename = "InDHT")]
    InDht,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::Free => write!(f, "Free"),
            PeerState::Leader => write!(f, "Leader"),
            PeerState::InDht => write!(f, "InDHT"),
        }
    }
}

/// Events that move a peer between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Chosen to lead a new ring
    ElectedLeader,
    /// Chosen as a non-leader member (setup or join)
    Selected,
    /// Left the ring voluntarily
    Left,
    /// The whole ring was dissolved
    TornDown,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::ElectedLeader => write!(f, "elected-leader"),
            Transition::Selected => write!(f, "selected"),
            Transition::Left => write!(f, "left"),
            Transition::TornDown => write!(f, "torn-down"),
        }
    }
}

/// A transition not allowed from the peer's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition '{transition}' from state {from}")]
pub struct InvalidTransition {
    pub from: PeerState,
    pub transition: Transition,
}

impl PeerState {
    /// Resolve the state reached by applying `transition`.
    ///
    /// Pure: callers validate every member before mutating any of them.
    pub fn apply(self, transition: Transition) -> Result<PeerState, InvalidTransition> {
        match (self, transition) {
            (PeerState::Free, Transition::ElectedLeader) => Ok(PeerState::Leader),
            (PeerState::Free, Transition::Selected) => Ok(PeerState::InDht),
            (PeerState::InDht, Transition::Left) => Ok(PeerState::Free),
            (PeerState::InDht, Transition::TornDown) => Ok(PeerState::Free),
            (PeerState::Leader, Transition::TornDown) => Ok(PeerState::Free),
            (from, transition) => Err(InvalidTransition { from, transition }),
        }
    }
}

/// Identity and addressing record of a registered peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    pub address: PeerAddress,
    pub state: PeerState,
    /// Name of the next peer clockwise in the ring, if any
    pub right_neighbor: Option<String>,
}

impl Peer {
    pub fn new(name: impl Into<String>, address: PeerAddress) -> Self {
        Self {
            name: name.into(),
            address,
            state: PeerState::Free,
            right_neighbor: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == PeerState::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            PeerState::Free.apply(Transition::ElectedLeader),
            Ok(PeerState::Leader)
        );
        assert_eq!(PeerState::Free.apply(Transition::Selected), Ok(PeerState::InDht));
        assert_eq!(PeerState::InDht.apply(Transition::Left), Ok(PeerState::Free));
        assert_eq!(PeerState::InDht.apply(Transition::TornDown), Ok(PeerState::Free));
        assert_eq!(PeerState::Leader.apply(Transition::TornDown), Ok(PeerState::Free));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let invalid = [
            (PeerState::Free, Transition::Left),
            (PeerState::Free, Transition::TornDown),
            (PeerState::Leader, Transition::Left),
            (PeerState::Leader, Transition::Selected),
            (PeerState::Leader, Transition::ElectedLeader),
            (PeerState::InDht, Transition::Selected),
            (PeerState::InDht, Transition::ElectedLeader),
        ];

        for (from, transition) in invalid {
            let err = from.apply(transition).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.transition, transition);
        }
    }

    #[test]
    fn test_peer_address_sockets() {
        let addr = PeerAddress::new(Ipv4Addr::LOCALHOST, 44001, 44002);
        assert_eq!(addr.mgmt_addr().port(), 44001);
        assert_eq!(addr.data_addr().port(), 44002);
        assert_eq!(addr.to_string(), "127.0.0.1 44001 44002");
    }

    #[test]
    fn test_state_display_matches_wire_names() {
        assert_eq!(PeerState::InDht.to_string(), "InDHT");
        assert_eq!(serde_json::to_string(&PeerState::InDht).unwrap(), "\"InDHT\"");
    }
}
