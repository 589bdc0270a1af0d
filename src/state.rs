//! Per-pass runtime snapshot handed to renderers

use crate::error::Result;
use crate::model::{Container, Node, ResourceList, Service};
use crate::runtime::{RuntimeClient, DEFAULT_DESIRED_TASK_STATE};
use serde::Serialize;
use tracing::debug;

/// Everything a template can see during one reconciliation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    /// Running containers
    pub containers: ResourceList<Container>,
    /// Swarm services, empty outside a swarm manager
    pub services: ResourceList<Service>,
    /// Swarm nodes, empty outside a swarm manager
    pub nodes: ResourceList<Node>,
}

impl State {
    /// Capture a fresh snapshot
    ///
    /// A failure to list containers fails the capture. Services and nodes
    /// fall back to empty lists.
    pub async fn capture(runtime: &dyn RuntimeClient) -> Result<Self> {
        let containers = runtime.containers().await?;

        let services = runtime
            .services(DEFAULT_DESIRED_TASK_STATE)
            .await
            .unwrap_or_else(|e| {
                debug!("Services unavailable: {}", e);
                ResourceList::new()
            });

        let nodes = runtime.nodes().await.unwrap_or_else(|e| {
            debug!("Nodes unavailable: {}", e);
            ResourceList::new()
        });

        debug!(
            "Captured {} containers, {} services, {} nodes",
            containers.len(),
            services.len(),
            nodes.len()
        );

        Ok(Self {
            containers,
            services,
            nodes,
        })
    }

    /// JSON form used for template lookups
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
