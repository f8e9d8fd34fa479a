//! Ringmesh Core
//!
//! Membership and topology coordination for a ring overlay: the peer
//! registry, peer lifecycle, leader-driven ring setup, and the
//! join/leave/teardown protocol. Everything here is synchronous and owned
//! by a single [`RingManager`]; the server crate supplies concurrency,
//! transport and delivery of the resulting notifications.

pub mod error;
pub mod manager;
pub mod membership;
pub mod notification;
pub mod peer;
pub mod registry;
pub mod ring;
pub mod routing;
pub mod setup;

pub use error::{
    JoinError, LeaveError, ManagerError, QueryError, RegistryError, SetupError, TeardownError,
};
pub use manager::{ManagerStats, Outcome, RingManager};
pub use membership::LeaveOutcome;
pub use notification::{Notification, NotificationKind};
pub use peer::{InvalidTransition, Peer, PeerAddress, PeerState, Transition};
pub use registry::PeerRegistry;
pub use ring::{Ring, MIN_RING_SIZE};
pub use routing::{QueryRoute, RendezvousRouter, ResponsibleNode};
pub use setup::SetupInProgress;
