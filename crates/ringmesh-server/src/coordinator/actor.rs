//! CoordinatorActor
//!
//! Owns the `RingManager`. kameo delivers one message at a time, so every
//! operation (setup steps 4-10 included) runs without interleaving.

use super::messages::{
    DeregisterPeer, GetRegistryStats, JoinDht, LeaveDht, LookupPeer, PeerLookup, RegisterPeer,
    RegistryStats, RouteQuery, SetupDht, TeardownDht,
};
use crate::observability::metrics;
use kameo::{
    message::{Context, Message},
    Actor,
};
use ringmesh_core::{
    JoinError, LeaveError, LeaveOutcome, Outcome, Peer, QueryError, QueryRoute, RegistryError,
    RendezvousRouter, Ring, RingManager, SetupError, TeardownError,
};
use tracing::info;

#[derive(Actor)]
pub struct CoordinatorActor {
    manager: RingManager,
    router: RendezvousRouter,
}

impl CoordinatorActor {
    pub fn new(manager: RingManager) -> Self {
        info!(
            registered = manager.registry().len(),
            "Initializing CoordinatorActor"
        );
        Self {
            manager,
            router: RendezvousRouter,
        }
    }

    /// Coordinator whose member selection follows `seed`, or entropy.
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(RingManager::with_seed(seed)),
            None => Self::new(RingManager::new()),
        }
    }

    fn publish_membership(&self) {
        let stats = self.manager.stats();
        metrics::set_membership(stats.registered, stats.free, stats.ring_size);
    }
}

impl Message<RegisterPeer> for CoordinatorActor {
    type Reply = Result<(), RegistryError>;

    async fn handle(
        &mut self,
        msg: RegisterPeer,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.manager.register(&msg.name, msg.address)?;
        self.publish_membership();
        Ok(())
    }
}

impl Message<DeregisterPeer> for CoordinatorActor {
    type Reply = Result<Outcome<Peer>, RegistryError>;

    async fn handle(
        &mut self,
        msg: DeregisterPeer,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let outcome = self.manager.deregister(&msg.name)?;
        self.publish_membership();
        Ok(outcome)
    }
}

impl Message<SetupDht> for CoordinatorActor {
    type Reply = Result<Outcome<Ring>, SetupError>;

    async fn handle(
        &mut self,
        msg: SetupDht,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let outcome = self.manager.setup(&msg.leader, msg.size)?;
        self.publish_membership();
        Ok(outcome)
    }
}

impl Message<JoinDht> for CoordinatorActor {
    type Reply = Result<Outcome<Ring>, JoinError>;

    async fn handle(
        &mut self,
        msg: JoinDht,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let outcome = self.manager.join(&msg.peer)?;
        self.publish_membership();
        Ok(outcome)
    }
}

impl Message<LeaveDht> for CoordinatorActor {
    type Reply = Result<Outcome<LeaveOutcome>, LeaveError>;

    async fn handle(
        &mut self,
        msg: LeaveDht,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let outcome = self.manager.leave(&msg.peer)?;
        self.publish_membership();
        Ok(outcome)
    }
}

impl Message<TeardownDht> for CoordinatorActor {
    type Reply = Result<Outcome<Ring>, TeardownError>;

    async fn handle(
        &mut self,
        msg: TeardownDht,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let outcome = self.manager.teardown(&msg.leader)?;
        self.publish_membership();
        Ok(outcome)
    }
}

impl Message<RouteQuery> for CoordinatorActor {
    type Reply = Result<QueryRoute, QueryError>;

    async fn handle(
        &mut self,
        msg: RouteQuery,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.manager.route_query(&msg.peer, &msg.event_id, &self.router)
    }
}

impl Message<LookupPeer> for CoordinatorActor {
    type Reply = PeerLookup;

    async fn handle(
        &mut self,
        msg: LookupPeer,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        PeerLookup {
            peer: self.manager.lookup(&msg.name).cloned(),
        }
    }
}

impl Message<GetRegistryStats> for CoordinatorActor {
    type Reply = RegistryStats;

    async fn handle(
        &mut self,
        _msg: GetRegistryStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let stats = self.manager.stats();
        RegistryStats {
            registered: stats.registered,
            free: stats.free,
            ring_size: stats.ring_size,
            ring_leader: self.manager.active_ring().map(|ring| ring.leader().to_string()),
            setups_in_progress: stats.setups_in_progress,
        }
    }
}
