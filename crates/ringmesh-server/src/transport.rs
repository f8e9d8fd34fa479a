//! Datagram Transport
//!
//! Outbound delivery for responses, ring notifications and forwarded
//! queries. Everything the manager sends is a single text line in one
//! datagram; delivery is best-effort and never feeds back into the
//! coordinator's state.
//!
//! # Available Transports
//!
//! - [`UdpTransport`]: sends from the manager's own socket
//! - [`ChannelTransport`]: records `(address, line)` pairs, for tests

use crate::observability::{events, metrics};
use futures::future::join_all;
use ringmesh_core::{Notification, QueryRoute};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("send to {addr} failed: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("short send to {addr}: {sent} of {len} bytes")]
    Truncated {
        addr: SocketAddr,
        sent: usize,
        len: usize,
    },
    #[error("transport closed")]
    Closed,
}

/// Unicast delivery of one line to one address.
pub trait Transport: Send + Sync + 'static {
    fn send_to(
        &self,
        addr: SocketAddr,
        line: String,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Hands a routed query to the responsible ring member.
pub trait QueryForwarder: Send + Sync {
    fn forward_query(&self, route: &QueryRoute) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Queries travel to the member's data port as `query <from> <event-id>`.
impl<T: Transport> QueryForwarder for T {
    async fn forward_query(&self, route: &QueryRoute) -> Result<(), DeliveryError> {
        let line = format!("query {} {}", route.from, route.event_id);
        self.send_to(route.to_address.data_addr(), line).await
    }
}

#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, addr: SocketAddr, line: String) -> Result<(), DeliveryError> {
        let sent = self
            .socket
            .send_to(line.as_bytes(), addr)
            .await
            .map_err(|source| DeliveryError::Io { addr, source })?;
        if sent != line.len() {
            return Err(DeliveryError::Truncated {
                addr,
                sent,
                len: line.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(SocketAddr, String)>,
}

impl ChannelTransport {
    /// Transport plus the receiver observing everything it sends.
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<(SocketAddr, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    async fn send_to(&self, addr: SocketAddr, line: String) -> Result<(), DeliveryError> {
        self.tx.send((addr, line)).map_err(|_| DeliveryError::Closed)
    }
}

/// Counts from one fan-out round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver every notification concurrently to its recipient's management
/// address. Failures are logged and counted only.
pub async fn fan_out<T: Transport>(transport: &T, notifications: Vec<Notification>) -> FanOutReport {
    let sends = notifications.into_iter().map(|notification| async move {
        let addr = notification.address.mgmt_addr();
        let result = transport.send_to(addr, notification.to_string()).await;
        (notification, addr, result)
    });

    let mut report = FanOutReport::default();
    for (notification, addr, result) in join_all(sends).await {
        let kind = notification.kind_name();
        match result {
            Ok(()) => {
                report.delivered += 1;
                metrics::record_notification(kind, true);
            }
            Err(e) => {
                report.failed += 1;
                metrics::record_notification(kind, false);
                events::notification_failed(&notification.recipient, kind, addr, &e.to_string());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringmesh_core::{NotificationKind, PeerAddress};
    use std::net::Ipv4Addr;

    fn teardown_for(name: &str, mgmt_port: u16) -> Notification {
        Notification {
            recipient: name.to_string(),
            address: PeerAddress::new(Ipv4Addr::LOCALHOST, mgmt_port, mgmt_port + 1),
            kind: NotificationKind::Teardown {
                leader: "Peer1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_recipient() {
        let (transport, mut rx) = ChannelTransport::unbounded();
        let report = fan_out(
            &transport,
            vec![teardown_for("Peer1", 44001), teardown_for("Peer2", 44003)],
        )
        .await;
        assert_eq!(report, FanOutReport { delivered: 2, failed: 0 });

        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("127.0.0.1:44001".parse().unwrap(), "teardown Peer1".to_string()),
                ("127.0.0.1:44003".parse().unwrap(), "teardown Peer1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fan_out_counts_failures() {
        let (transport, rx) = ChannelTransport::unbounded();
        drop(rx);
        let report = fan_out(&transport, vec![teardown_for("Peer2", 44003)]).await;
        assert_eq!(report, FanOutReport { delivered: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_query_goes_to_data_port() {
        let (transport, mut rx) = ChannelTransport::unbounded();
        let route = QueryRoute {
            from: "Peer5".to_string(),
            to: "Peer2".to_string(),
            to_address: PeerAddress::new(Ipv4Addr::LOCALHOST, 44003, 44004),
            event_id: "1996-04".to_string(),
        };
        transport.forward_query(&route).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ("127.0.0.1:44004".parse().unwrap(), "query Peer5 1996-04".to_string())
        );
    }

    #[tokio::test]
    async fn test_udp_transport_sends_line() {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(sender);

        transport
            .send_to(receiver.local_addr().unwrap(), "refresh Peer1 4".to_string())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"refresh Peer1 4");
    }
}
