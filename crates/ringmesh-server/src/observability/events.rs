//! Structured Events
//!
//! One function per domain event so field names stay consistent across the
//! server. Every event carries an `event_type` field.
//!
//! Event types:
//! - `peer_registered` / `peer_deregistered` - registry membership
//! - `ring_formed` - setup committed
//! - `peer_joined` / `peer_left` - ring membership changes
//! - `ring_torn_down` - ring dissolved by its leader or by a departure
//! - `query_routed` - a free peer's query was forwarded
//! - `command_rejected` - an operation failed its preconditions
//! - `consistency_violation` - coordinator state found inconsistent
//! - `notification_failed` - best-effort delivery to a peer failed
//! - `unrecognized_command` - datagram ignored

use std::net::SocketAddr;
use tracing::{error, info, warn};

pub fn peer_registered(peer: &str, address: &str) {
    info!(
        event_type = "peer_registered",
        peer = %peer,
        address = %address,
        "Peer registered"
    );
}

pub fn peer_deregistered(peer: &str, notified: usize) {
    info!(
        event_type = "peer_deregistered",
        peer = %peer,
        notified = notified,
        "Peer deregistered"
    );
}

/// `year` is carried by `setup-dht` for the peers' own use and is not
/// interpreted by the manager.
pub fn ring_formed(leader: &str, size: usize, year: &str) {
    info!(
        event_type = "ring_formed",
        leader = %leader,
        size = size,
        year = %year,
        "Ring formed"
    );
}

pub fn peer_joined(peer: &str, leader: &str, size: usize) {
    info!(
        event_type = "peer_joined",
        peer = %peer,
        leader = %leader,
        size = size,
        "Peer joined ring"
    );
}

pub fn peer_left(peer: &str, dissolved: bool) {
    info!(
        event_type = "peer_left",
        peer = %peer,
        dissolved = dissolved,
        "Peer left ring"
    );
}

pub fn ring_torn_down(leader: &str, size: usize) {
    info!(
        event_type = "ring_torn_down",
        leader = %leader,
        size = size,
        "Ring torn down"
    );
}

pub fn query_routed(from: &str, to: &str, event_id: &str) {
    info!(
        event_type = "query_routed",
        from = %from,
        to = %to,
        event_id = %event_id,
        "Query routed"
    );
}

pub fn command_rejected(command: &str, sender: &str, reason: &str) {
    warn!(
        event_type = "command_rejected",
        command = %command,
        sender = %sender,
        reason = %reason,
        "Command rejected"
    );
}

pub fn consistency_violation(command: &str, sender: &str, reason: &str) {
    error!(
        event_type = "consistency_violation",
        command = %command,
        sender = %sender,
        reason = %reason,
        "Coordinator state inconsistent"
    );
}

pub fn notification_failed(recipient: &str, kind: &str, address: SocketAddr, error: &str) {
    warn!(
        event_type = "notification_failed",
        recipient = %recipient,
        kind = %kind,
        address = %address,
        error = %error,
        "Notification delivery failed"
    );
}

pub fn unrecognized_command(source: SocketAddr, reason: &str) {
    warn!(
        event_type = "unrecognized_command",
        source = %source,
        reason = %reason,
        "Ignoring unrecognized command"
    );
}
