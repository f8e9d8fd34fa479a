//! UDP Server Loop
//!
//! Receives one command per datagram. Commands from one source address are
//! handled in arrival order by that source's worker task; different sources
//! proceed independently. The coordinator actor is the only place shared
//! state is serialized.

use crate::config::ServerConfig;
use crate::coordinator::CoordinatorActor;
use crate::dispatch::CommandDispatcher;
use crate::transport::UdpTransport;
use anyhow::Context as _;
use kameo::prelude::*;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct Server {
    socket: Arc<UdpSocket>,
    dispatcher: CommandDispatcher<UdpTransport>,
    max_datagram: usize,
}

impl Server {
    /// Bind the command socket and spawn the coordinator.
    pub async fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        let socket = Arc::new(socket);

        let coordinator = CoordinatorActor::spawn(CoordinatorActor::with_seed(config.seed));
        let transport = Arc::new(UdpTransport::new(Arc::clone(&socket)));

        Ok(Self {
            dispatcher: CommandDispatcher::new(coordinator, transport),
            socket,
            max_datagram: config.max_datagram,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Workers finish the commands already queued to them after the loop
    /// stops.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        info!(address = %self.local_addr()?, "Listening for commands");

        // One spare byte tells a datagram that fits exactly from a truncated one
        let mut buf = vec![0u8; self.max_datagram + 1];
        // TODO: evict workers for sources that have gone quiet
        let mut workers: HashMap<SocketAddr, mpsc::UnboundedSender<String>> = HashMap::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(workers = workers.len(), "Shutdown requested, stopping command loop");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, source) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            // ICMP port-unreachable from an earlier send surfaces here on some platforms
                            warn!(error = %e, "Receive failed");
                            continue;
                        }
                    };

                    if len > self.max_datagram {
                        warn!(
                            source = %source,
                            max = self.max_datagram,
                            "Dropping oversized datagram"
                        );
                        continue;
                    }

                    let line = match std::str::from_utf8(&buf[..len]) {
                        Ok(line) => line.trim().to_string(),
                        Err(_) => {
                            warn!(source = %source, len = len, "Dropping non UTF-8 datagram");
                            continue;
                        }
                    };
                    debug!(source = %source, command = %line, "Datagram received");

                    self.enqueue(&mut workers, source, line);
                }
            }
        }
    }

    /// Queue `line` on the worker for `source`, starting one if needed.
    fn enqueue(
        &self,
        workers: &mut HashMap<SocketAddr, mpsc::UnboundedSender<String>>,
        source: SocketAddr,
        line: String,
    ) {
        let line = match workers.get(&source) {
            Some(tx) => match tx.send(line) {
                Ok(()) => return,
                Err(mpsc::error::SendError(line)) => line,
            },
            None => line,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(source_worker(self.dispatcher.clone(), source, rx));
        if tx.send(line).is_err() {
            warn!(source = %source, "Worker exited before its first command");
            return;
        }
        workers.insert(source, tx);
    }
}

/// Handles one source's commands strictly in the order they arrived.
async fn source_worker(
    dispatcher: CommandDispatcher<UdpTransport>,
    source: SocketAddr,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    debug!(source = %source, "Command worker started");
    while let Some(line) = rx.recv().await {
        dispatcher.handle(&line, source).await;
    }
    debug!(source = %source, "Command worker stopped");
}
