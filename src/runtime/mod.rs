//! Container runtime access
//!
//! The rest of the crate only talks to the runtime through [`RuntimeClient`].
//! Listings build fresh snapshots on every call; nothing is cached between
//! reconciliation passes.

pub mod docker;
pub mod events;
#[cfg(test)]
pub mod memory;

pub use docker::DockerClient;
pub use events::{EventFilter, DEFAULT_EVENTS};
#[cfg(test)]
pub use memory::MemoryRuntime;

use crate::error::Result;
use crate::model::{Container, Node, ResourceList, Service};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Desired task state used when listing services
pub const DEFAULT_DESIRED_TASK_STATE: &str = "running";

/// Event reported by the runtime's event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    /// Object type (`container`, `network`, `service`, ...)
    pub kind: String,
    /// Event status or action (`start`, `die`, `health_status: healthy`, ...)
    pub status: String,
    /// ID of the object the event is about
    pub actor_id: String,
    /// When the runtime emitted the event
    pub time: DateTime<Utc>,
}

impl RuntimeEvent {
    pub fn container(status: &str, actor_id: &str) -> Self {
        Self {
            kind: "container".to_string(),
            status: status.to_string(),
            actor_id: actor_id.to_string(),
            time: Utc::now(),
        }
    }
}

/// Read and mutate access to a container runtime
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Running containers
    async fn containers(&self) -> Result<ResourceList<Container>>;

    /// Swarm services with their tasks in `desired_task_state`
    ///
    /// Yields an empty list on engines that are not swarm managers.
    async fn services(&self, desired_task_state: &str) -> Result<ResourceList<Service>>;

    /// Swarm nodes, empty on engines that are not swarm managers
    async fn nodes(&self) -> Result<ResourceList<Node>>;

    async fn restart_container(&self, id: &str) -> Result<()>;

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()>;

    /// Force a rolling update of a service without changing its spec
    async fn force_update_service(&self, id: &str) -> Result<()>;

    /// Subscribe to the runtime's event stream
    ///
    /// The channel closes when the stream ends or fails.
    async fn events(&self) -> Result<mpsc::Receiver<RuntimeEvent>>;
}
