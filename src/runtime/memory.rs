//! In-memory runtime
//!
//! Serves fixed listings and records every mutation instead of performing it.
//! Used by the test suites and for dry runs.

use super::{RuntimeClient, RuntimeEvent};
use crate::error::{PygenError, Result};
use crate::model::{Container, Node, ResourceList, Service};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

const EVENT_BUFFER: usize = 64;

/// Mutation recorded by [`MemoryRuntime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Restart(String),
    Kill { id: String, signal: String },
    ForceUpdate(String),
}

/// Runtime backed by in-memory listings
#[derive(Default)]
pub struct MemoryRuntime {
    containers: RwLock<Vec<Container>>,
    services: RwLock<Vec<Service>>,
    nodes: RwLock<Vec<Node>>,
    swarm_manager: bool,
    failing: RwLock<HashSet<String>>,
    mutations: Mutex<Vec<Mutation>>,
    subscribers: Mutex<Vec<mpsc::Sender<RuntimeEvent>>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report services and nodes, as a swarm manager engine would
    pub fn swarm_manager(mut self, enabled: bool) -> Self {
        self.swarm_manager = enabled;
        self
    }

    pub fn with_container(self, container: Container) -> Self {
        if let Ok(mut containers) = self.containers.write() {
            containers.push(container);
        }
        self
    }

    pub fn with_service(self, service: Service) -> Self {
        if let Ok(mut services) = self.services.write() {
            services.push(service);
        }
        self
    }

    pub fn with_node(self, node: Node) -> Self {
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.push(node);
        }
        self
    }

    /// Make every mutation against `id` fail
    pub fn failing(self, id: &str) -> Self {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(id.to_string());
        }
        self
    }

    /// Replace the container listing
    pub fn set_containers(&self, containers: Vec<Container>) -> Result<()> {
        let mut current = self
            .containers
            .write()
            .map_err(|_| PygenError::Lock("Failed to acquire containers lock".to_string()))?;
        *current = containers;
        Ok(())
    }

    /// Mutations performed so far, in order
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations
            .lock()
            .map(|mutations| mutations.clone())
            .unwrap_or_default()
    }

    /// Deliver an event to every open subscription
    pub fn emit(&self, event: RuntimeEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }

    fn record(&self, id: &str, mutation: Mutation) -> Result<()> {
        let failing = self
            .failing
            .read()
            .map_err(|_| PygenError::Lock("Failed to acquire failure lock".to_string()))?;
        if failing.contains(id) {
            return Err(PygenError::Runtime(format!("Injected failure for {}", id)));
        }

        debug!("Recording {:?}", mutation);
        self.mutations
            .lock()
            .map_err(|_| PygenError::Lock("Failed to acquire mutation log".to_string()))?
            .push(mutation);
        Ok(())
    }
}

#[async_trait]
impl RuntimeClient for MemoryRuntime {
    async fn containers(&self) -> Result<ResourceList<Container>> {
        let containers = self
            .containers
            .read()
            .map_err(|_| PygenError::Lock("Failed to acquire containers lock".to_string()))?;
        Ok(ResourceList::from(containers.clone()))
    }

    async fn services(&self, desired_task_state: &str) -> Result<ResourceList<Service>> {
        if !self.swarm_manager {
            return Ok(ResourceList::new());
        }

        let services = self
            .services
            .read()
            .map_err(|_| PygenError::Lock("Failed to acquire services lock".to_string()))?;

        let listed = services
            .iter()
            .map(|service| {
                let mut service = service.clone();
                if !desired_task_state.is_empty() {
                    service.tasks = service
                        .tasks
                        .filter(|task| task.desired_state == desired_task_state);
                }
                service
            })
            .collect::<Vec<_>>();

        Ok(ResourceList::from(listed))
    }

    async fn nodes(&self) -> Result<ResourceList<Node>> {
        if !self.swarm_manager {
            return Ok(ResourceList::new());
        }

        let nodes = self
            .nodes
            .read()
            .map_err(|_| PygenError::Lock("Failed to acquire nodes lock".to_string()))?;
        Ok(ResourceList::from(nodes.clone()))
    }

    async fn restart_container(&self, id: &str) -> Result<()> {
        self.record(id, Mutation::Restart(id.to_string()))
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        self.record(
            id,
            Mutation::Kill {
                id: id.to_string(),
                signal: signal.to_string(),
            },
        )
    }

    async fn force_update_service(&self, id: &str) -> Result<()> {
        self.record(id, Mutation::ForceUpdate(id.to_string()))
    }

    async fn events(&self) -> Result<mpsc::Receiver<RuntimeEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.subscribers
            .lock()
            .map_err(|_| PygenError::Lock("Failed to acquire subscribers lock".to_string()))?
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceParts, Task};

    #[tokio::test]
    async fn test_services_hidden_without_swarm() {
        let runtime = MemoryRuntime::new().with_service(Service::default());
        assert!(runtime.services("running").await.unwrap().is_empty());
        assert!(runtime.nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_services_filter_tasks() {
        let service = Service::assemble(ServiceParts {
            id: "s1".to_string(),
            name: "web".to_string(),
            tasks: vec![
                Task::new("t1", "s1", "web", Some(1), "n1"),
                Task::new("t2", "s1", "web", Some(2), "n1").state("shutdown", "shutdown"),
            ],
            ..Default::default()
        });
        let runtime = MemoryRuntime::new().swarm_manager(true).with_service(service);

        let running = runtime.services("running").await.unwrap();
        assert_eq!(running.first().unwrap().tasks.len(), 1);

        let all = runtime.services("").await.unwrap();
        assert_eq!(all.first().unwrap().tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_mutations_recorded() {
        let runtime = MemoryRuntime::new().failing("bad");

        runtime.restart_container("c1").await.unwrap();
        runtime.kill_container("c2", "HUP").await.unwrap();
        assert!(runtime.restart_container("bad").await.is_err());

        assert_eq!(
            runtime.mutations(),
            vec![
                Mutation::Restart("c1".to_string()),
                Mutation::Kill {
                    id: "c2".to_string(),
                    signal: "HUP".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_events_delivered() {
        let runtime = MemoryRuntime::new();
        let mut rx = runtime.events().await.unwrap();

        runtime.emit(RuntimeEvent::container("start", "c1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, "start");
        assert_eq!(event.actor_id, "c1");
    }
}
