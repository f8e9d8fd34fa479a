//! Command Dispatcher
//!
//! Turns one inbound datagram into at most one response for its sender plus
//! the notifications the committed change owes to ring members. The
//! coordinator is only held for the operation itself; replies, fan-out and
//! query forwarding happen afterwards on the calling task.

use crate::command::{Command, CommandError, Response};
use crate::coordinator::{
    flatten, CoordinatorActor, CoordinatorError, DeregisterPeer, JoinDht, LeaveDht, LookupPeer,
    PeerLookup, RegisterPeer, RouteQuery, SetupDht, TeardownDht,
};
use crate::observability::{events, metrics};
use crate::transport::{fan_out, DeliveryError, QueryForwarder, Transport};
use kameo::actor::ActorRef;
use ringmesh_core::{LeaveOutcome, Notification};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error("query forwarding failed: {0}")]
    Forward(#[from] DeliveryError),
}

impl DispatchError {
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, DispatchError::Coordinator(e) if e.is_consistency_violation())
    }
}

/// Everything that has to leave the manager after one command.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// `None` when the datagram is ignored
    pub response: Option<Response>,
    pub reply_to: SocketAddr,
    pub notifications: Vec<Notification>,
}

impl Dispatch {
    fn ignored(source: SocketAddr) -> Self {
        Self {
            response: None,
            reply_to: source,
            notifications: Vec::new(),
        }
    }
}

pub struct CommandDispatcher<T> {
    coordinator: ActorRef<CoordinatorActor>,
    transport: Arc<T>,
}

impl<T> Clone for CommandDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> CommandDispatcher<T> {
    pub fn new(coordinator: ActorRef<CoordinatorActor>, transport: Arc<T>) -> Self {
        Self {
            coordinator,
            transport,
        }
    }

    /// Handle one datagram end to end: execute, reply, then fan out.
    ///
    /// Returns the response sent, if any.
    pub async fn handle(&self, line: &str, source: SocketAddr) -> Option<Response> {
        let dispatch = self.dispatch(line, source).await;
        let response = dispatch.response?;

        if let Err(e) = self
            .transport
            .send_to(dispatch.reply_to, response.to_string())
            .await
        {
            warn!(reply_to = %dispatch.reply_to, error = %e, "Failed to send response");
        }

        if !dispatch.notifications.is_empty() {
            let report = fan_out(self.transport.as_ref(), dispatch.notifications).await;
            debug!(
                delivered = report.delivered,
                failed = report.failed,
                "Notifications fanned out"
            );
        }

        Some(response)
    }

    /// Decode and execute a command without sending anything.
    pub async fn dispatch(&self, line: &str, source: SocketAddr) -> Dispatch {
        let started = Instant::now();

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) if e.is_unrecognized() => {
                events::unrecognized_command(source, &e.to_string());
                metrics::record_command("unknown", "unrecognized", started.elapsed());
                return Dispatch::ignored(source);
            }
            Err(e) => return self.malformed(e, source, started),
        };

        let reply_to = self.reply_address(&command, source).await;
        let (response, notifications, outcome) = match self.execute(&command).await {
            Ok(notifications) => (Response::Success, notifications, "success"),
            Err(e) => {
                let reason = e.to_string();
                if e.is_consistency_violation() {
                    events::consistency_violation(command.kind(), command.sender(), &reason);
                } else {
                    events::command_rejected(command.kind(), command.sender(), &reason);
                }
                let response = match command {
                    Command::TeardownDht { .. } => Response::FailureWithReason(reason),
                    _ => Response::Failure,
                };
                (response, Vec::new(), "failure")
            }
        };

        metrics::record_command(command.kind(), outcome, started.elapsed());
        Dispatch {
            response: Some(response),
            reply_to,
            notifications,
        }
    }

    fn malformed(&self, error: CommandError, source: SocketAddr, started: Instant) -> Dispatch {
        events::command_rejected("malformed", &source.to_string(), &error.to_string());
        metrics::record_command("malformed", "failure", started.elapsed());
        Dispatch {
            response: Some(Response::Failure),
            reply_to: source,
            notifications: Vec::new(),
        }
    }

    /// Registered peers are answered on their management port; anyone
    /// else at the datagram's source.
    async fn reply_address(&self, command: &Command, source: SocketAddr) -> SocketAddr {
        if let Command::Register { address, .. } = command {
            return address.mgmt_addr();
        }

        let lookup = self
            .coordinator
            .ask(LookupPeer {
                name: command.sender().to_string(),
            })
            .await;
        match lookup {
            Ok(PeerLookup { peer: Some(peer) }) => peer.address.mgmt_addr(),
            _ => source,
        }
    }

    async fn execute(&self, command: &Command) -> Result<Vec<Notification>, DispatchError> {
        let notifications = match command {
            Command::Register { name, address } => {
                flatten(
                    self.coordinator
                        .ask(RegisterPeer {
                            name: name.clone(),
                            address: *address,
                        })
                        .await,
                )?;
                events::peer_registered(name, &address.to_string());
                Vec::new()
            }
            Command::SetupDht { leader, size, year } => {
                let outcome = flatten(
                    self.coordinator
                        .ask(SetupDht {
                            leader: leader.clone(),
                            size: *size,
                        })
                        .await,
                )?;
                events::ring_formed(leader, outcome.value.len(), year);
                outcome.notifications
            }
            Command::JoinDht { peer } => {
                let outcome =
                    flatten(self.coordinator.ask(JoinDht { peer: peer.clone() }).await)?;
                events::peer_joined(peer, outcome.value.leader(), outcome.value.len());
                outcome.notifications
            }
            Command::LeaveDht { peer } => {
                let outcome =
                    flatten(self.coordinator.ask(LeaveDht { peer: peer.clone() }).await)?;
                events::peer_left(peer, outcome.value == LeaveOutcome::Dissolved);
                outcome.notifications
            }
            Command::TeardownDht { leader } => {
                let outcome = flatten(
                    self.coordinator
                        .ask(TeardownDht {
                            leader: leader.clone(),
                        })
                        .await,
                )?;
                events::ring_torn_down(leader, outcome.value.len());
                outcome.notifications
            }
            Command::Deregister { peer } => {
                let outcome = flatten(
                    self.coordinator
                        .ask(DeregisterPeer { name: peer.clone() })
                        .await,
                )?;
                events::peer_deregistered(peer, outcome.notifications.len());
                outcome.notifications
            }
            Command::QueryDht { peer, event_id } => {
                let route = flatten(
                    self.coordinator
                        .ask(RouteQuery {
                            peer: peer.clone(),
                            event_id: event_id.clone(),
                        })
                        .await,
                )?;
                self.transport.forward_query(&route).await?;
                events::query_routed(&route.from, &route.to, &route.event_id);
                Vec::new()
            }
        };
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::GetRegistryStats;
    use crate::transport::ChannelTransport;
    use kameo::prelude::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    type Sent = UnboundedReceiver<(SocketAddr, String)>;

    fn dispatcher() -> (CommandDispatcher<ChannelTransport>, Sent) {
        let coordinator = CoordinatorActor::spawn(CoordinatorActor::with_seed(Some(3)));
        let (transport, rx) = ChannelTransport::unbounded();
        (CommandDispatcher::new(coordinator, Arc::new(transport)), rx)
    }

    fn source() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn drain(rx: &mut Sent) -> Vec<(SocketAddr, String)> {
        let mut sent = Vec::new();
        while let Ok(item) = rx.try_recv() {
            sent.push(item);
        }
        sent
    }

    async fn register_peers(dispatcher: &CommandDispatcher<ChannelTransport>, count: u16) {
        for i in 1..=count {
            let line = format!(
                "register Peer{i} 127.0.0.1 {} {}",
                44000 + 2 * i - 1,
                44000 + 2 * i
            );
            assert_eq!(
                dispatcher.handle(&line, source()).await,
                Some(Response::Success)
            );
        }
    }

    #[tokio::test]
    async fn test_register_replies_on_management_port() {
        let (dispatcher, mut rx) = dispatcher();
        register_peers(&dispatcher, 1).await;
        assert_eq!(
            drain(&mut rx),
            vec![("127.0.0.1:44001".parse().unwrap(), "SUCCESS".to_string())]
        );

        // Same name again fails, still answered at the address it gave
        let response = dispatcher
            .handle("register Peer1 127.0.0.1 45001 45002", source())
            .await;
        assert_eq!(response, Some(Response::Failure));
        assert_eq!(drain(&mut rx)[0].0, "127.0.0.1:45001".parse().unwrap());
    }

    #[tokio::test]
    async fn test_three_peer_setup_and_teardown() {
        let (dispatcher, mut rx) = dispatcher();
        register_peers(&dispatcher, 3).await;
        drain(&mut rx);

        let response = dispatcher.handle("setup-dht Peer1 3 2022", source()).await;
        assert_eq!(response, Some(Response::Success));
        let sent = drain(&mut rx);
        assert_eq!(sent[0], ("127.0.0.1:44001".parse().unwrap(), "SUCCESS".to_string()));
        let assigned = sent.iter().filter(|(_, line)| line.starts_with("assigned Peer1 ")).count();
        assert_eq!(assigned, 3);

        let response = dispatcher.handle("teardown-dht Peer1", source()).await;
        assert_eq!(response, Some(Response::Success));
        let teardowns = drain(&mut rx)
            .into_iter()
            .filter(|(_, line)| line == "teardown Peer1")
            .count();
        assert_eq!(teardowns, 3);

        let stats = dispatcher.coordinator.ask(GetRegistryStats).await.unwrap();
        assert_eq!(stats.free, 3);
        assert_eq!(stats.ring_size, 0);
    }

    #[tokio::test]
    async fn test_setup_with_too_few_peers_changes_nothing() {
        let (dispatcher, _rx) = dispatcher();
        register_peers(&dispatcher, 2).await;

        let dispatch = dispatcher.dispatch("setup-dht Peer1 3 2022", source()).await;
        assert_eq!(dispatch.response, Some(Response::Failure));
        assert!(dispatch.notifications.is_empty());

        let stats = dispatcher.coordinator.ask(GetRegistryStats).await.unwrap();
        assert_eq!(stats.registered, 2);
        assert_eq!(stats.free, 2);
        assert_eq!(stats.setups_in_progress, 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_carries_reason() {
        let (dispatcher, _rx) = dispatcher();
        register_peers(&dispatcher, 3).await;

        let dispatch = dispatcher.dispatch("teardown-dht Peer1", source()).await;
        assert_eq!(
            dispatch.response,
            Some(Response::FailureWithReason("no active ring".to_string()))
        );

        dispatcher.dispatch("setup-dht Peer1 3 1999", source()).await;
        let dispatch = dispatcher.dispatch("teardown-dht Peer2", source()).await;
        assert_eq!(
            dispatch.response,
            Some(Response::FailureWithReason(
                "'Peer2' is not the ring leader".to_string()
            ))
        );
        assert_eq!(dispatch.reply_to, "127.0.0.1:44003".parse().unwrap());
    }

    #[tokio::test]
    async fn test_join_and_leave_notify_members() {
        let (dispatcher, _rx) = dispatcher();
        register_peers(&dispatcher, 5).await;
        dispatcher.dispatch("setup-dht Peer1 3 2001", source()).await;

        let stats = dispatcher.coordinator.ask(GetRegistryStats).await.unwrap();
        assert_eq!(stats.free, 2);

        let outsider = {
            let mut found = None;
            for i in 2..=5 {
                let lookup = dispatcher
                    .coordinator
                    .ask(LookupPeer {
                        name: format!("Peer{i}"),
                    })
                    .await
                    .unwrap();
                if lookup.peer.as_ref().is_some_and(|peer| peer.is_free()) {
                    found = Some(format!("Peer{i}"));
                    break;
                }
            }
            found.unwrap()
        };

        let dispatch = dispatcher
            .dispatch(&format!("join-dht {outsider}"), source())
            .await;
        assert_eq!(dispatch.response, Some(Response::Success));
        assert_eq!(dispatch.notifications.len(), 4);

        let dispatch = dispatcher
            .dispatch(&format!("leave-dht {outsider}"), source())
            .await;
        assert_eq!(dispatch.response, Some(Response::Success));
        assert_eq!(dispatch.notifications.len(), 3);
        assert!(dispatch
            .notifications
            .iter()
            .all(|n| n.to_string() == "refresh Peer1 3"));
    }

    #[tokio::test]
    async fn test_query_forwarded_to_data_port() {
        let (dispatcher, mut rx) = dispatcher();
        register_peers(&dispatcher, 4).await;
        dispatcher.dispatch("setup-dht Peer1 3 2010", source()).await;
        drain(&mut rx);

        let mut outsider = None;
        for i in 2..=4 {
            let lookup = dispatcher
                .coordinator
                .ask(LookupPeer {
                    name: format!("Peer{i}"),
                })
                .await
                .unwrap();
            if lookup.peer.as_ref().is_some_and(|peer| peer.is_free()) {
                outsider = Some(format!("Peer{i}"));
            }
        }
        let outsider = outsider.unwrap();

        let response = dispatcher
            .handle(&format!("query-dht {outsider} 2010-06"), source())
            .await;
        assert_eq!(response, Some(Response::Success));

        let sent = drain(&mut rx);
        let (addr, line) = &sent[0];
        assert_eq!(line, &format!("query {outsider} 2010-06"));
        // Data ports are the even ones
        assert_eq!(addr.port() % 2, 0);
        assert_eq!(sent[1].1, "SUCCESS");
    }

    #[tokio::test]
    async fn test_unrecognized_command_is_ignored() {
        let (dispatcher, mut rx) = dispatcher();
        assert_eq!(dispatcher.handle("dance Peer1", source()).await, None);
        assert!(drain(&mut rx).is_empty());

        let stats = dispatcher.coordinator.ask(GetRegistryStats).await.unwrap();
        assert_eq!(stats.registered, 0);
    }

    #[tokio::test]
    async fn test_malformed_command_fails_to_source() {
        let (dispatcher, mut rx) = dispatcher();
        assert_eq!(
            dispatcher.handle("setup-dht Peer1", source()).await,
            Some(Response::Failure)
        );
        assert_eq!(drain(&mut rx), vec![(source(), "FAILURE".to_string())]);
    }

    #[tokio::test]
    async fn test_deregister_leader_notifies_members() {
        let (dispatcher, mut rx) = dispatcher();
        register_peers(&dispatcher, 3).await;
        dispatcher.dispatch("setup-dht Peer1 3 2022", source()).await;
        drain(&mut rx);

        let dispatch = dispatcher.dispatch("deregister Peer1", source()).await;
        assert_eq!(dispatch.response, Some(Response::Success));
        assert_eq!(dispatch.reply_to, "127.0.0.1:44001".parse().unwrap());
        assert_eq!(dispatch.notifications.len(), 3);

        let stats = dispatcher.coordinator.ask(GetRegistryStats).await.unwrap();
        assert_eq!(stats.registered, 2);
        assert_eq!(stats.free, 2);
    }
}
