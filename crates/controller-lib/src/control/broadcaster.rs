//! Push channel for cluster snapshots and alerts

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use super::ControlLoop;
use crate::health::components;
use crate::models::{ClusterSnapshot, NodeId};
use crate::random::BoxedRandom;
use crate::state::ClusterState;

/// Buffered events per subscriber before it starts lagging
const HUB_CAPACITY: usize = 64;

/// Event delivered to every subscriber
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterEvent {
    #[serde(rename = "state_update")]
    Snapshot(Arc<ClusterSnapshot>),
    Alert {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
    },
}

/// Fan-out of [`ClusterEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ClusterEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event; returns how many subscribers received it
    pub fn publish(&self, event: ClusterEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Resamples pod usage and pushes a consistent snapshot each tick
pub struct StateBroadcaster {
    state: ClusterState,
    hub: EventHub,
    rng: BoxedRandom,
}

impl StateBroadcaster {
    pub fn new(state: ClusterState, hub: EventHub, rng: BoxedRandom) -> Self {
        Self { state, hub, rng }
    }

    /// Take one snapshot and publish it
    pub fn broadcast(&mut self) -> Arc<ClusterSnapshot> {
        let rng = &mut self.rng;
        let snapshot = Arc::new(self.state.write(|registry, now| {
            registry.refresh_pod_usage(rng.as_mut());
            registry.snapshot(now)
        }));

        let delivered = self.hub.publish(ClusterEvent::Snapshot(snapshot.clone()));
        self.state.metrics().inc_snapshots_broadcast();
        trace!(
            subscribers = delivered,
            nodes = snapshot.nodes.len(),
            "Snapshot broadcast"
        );
        snapshot
    }
}

impl ControlLoop for StateBroadcaster {
    fn name(&self) -> &'static str {
        components::STATE_BROADCASTER
    }

    fn tick(&mut self) {
        self.broadcast();
    }
}
