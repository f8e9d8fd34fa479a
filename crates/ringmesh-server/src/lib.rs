//! Ringmesh Server Library
//!
//! UDP rendezvous manager: command codec, coordinator actor, dispatcher,
//! datagram transport and observability around `ringmesh-core`.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod observability;
pub mod server;
pub mod transport;
pub mod version;
