//! Coordinator Module
//!
//! The single mutual-exclusion domain for all registry and ring state.
//!
//! ```text
//! source worker ──ask──► CoordinatorActor ──► RingManager
//!       ▲                     │
//!       └──── Outcome ◄───────┘   (notifications delivered by the worker,
//!                                  after the actor has moved on)
//! ```

mod actor;
mod messages;

pub use actor::CoordinatorActor;
pub use messages::{
    DeregisterPeer, GetRegistryStats, JoinDht, LeaveDht, LookupPeer, PeerLookup, RegisterPeer,
    RegistryStats, RouteQuery, SetupDht, TeardownDht,
};

use kameo::error::SendError;
use ringmesh_core::ManagerError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The manager refused the operation
    #[error(transparent)]
    Rejected(#[from] ManagerError),
    #[error("coordinator unavailable: {0}")]
    Unavailable(String),
}

impl CoordinatorError {
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, CoordinatorError::Rejected(e) if e.is_consistency_violation())
    }
}

/// Split an ask result into the manager's own error and mailbox failures.
pub(crate) fn flatten<T, M, E>(result: Result<T, SendError<M, E>>) -> Result<T, CoordinatorError>
where
    E: Into<ManagerError>,
    SendError<M, E>: fmt::Debug,
{
    match result {
        Ok(value) => Ok(value),
        Err(SendError::HandlerError(e)) => Err(CoordinatorError::Rejected(e.into())),
        Err(other) => Err(CoordinatorError::Unavailable(format!("{other:?}"))),
    }
}
