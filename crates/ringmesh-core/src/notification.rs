//! Ring Notifications
//!
//! Messages the manager owes to ring members once a membership change has
//! committed. Delivery happens outside the coordinator and is best-effort.

use crate::peer::PeerAddress;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// The recipient was placed into a ring at `position`
    Assigned {
        leader: String,
        position: usize,
        size: usize,
        right_neighbor: String,
        right_address: PeerAddress,
    },
    /// Ring membership changed; the recipient should refresh its view
    Refresh { leader: String, size: usize },
    /// The ring was dissolved
    Teardown { leader: String },
}

/// A single message addressed to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub address: PeerAddress,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NotificationKind::Assigned { .. } => "assigned",
            NotificationKind::Refresh { .. } => "refresh",
            NotificationKind::Teardown { .. } => "teardown",
        }
    }
}

/// Single-line wire form sent to the recipient's management port.
impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Assigned {
                leader,
                position,
                size,
                right_neighbor,
                right_address,
            } => write!(
                f,
                "assigned {leader} {position} {size} {right_neighbor} {right_address}"
            ),
            NotificationKind::Refresh { leader, size } => write!(f, "refresh {leader} {size}"),
            NotificationKind::Teardown { leader } => write!(f, "teardown {leader}"),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
