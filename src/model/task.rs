//! Swarm task snapshots

use super::{
    matches_swarm_service, Env, Labels, Network, Networked, Resource, ResourceList,
    SWARM_NODE_ID_LABEL, SWARM_SERVICE_ID_LABEL, SWARM_SERVICE_NAME_LABEL, SWARM_TASK_ID_LABEL,
    SWARM_TASK_NAME_LABEL,
};
use serde::Serialize;
use std::sync::Arc;

/// Swarm task
///
/// Labels always carry the `com.docker.swarm.*` keys of the owning service,
/// the task itself and its node, on top of the container spec labels.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Task {
    /// Task ID
    pub id: String,
    /// `<service>.<slot>.<id>`, or `<service>.<node id>.<id>` for global services
    pub name: String,
    /// Node ID
    pub node_id: String,
    /// Service ID
    pub service_id: String,
    /// Slot (for replicated services)
    pub slot: Option<u64>,
    /// Container ID, empty until the task has a container
    pub container_id: String,
    /// Image reference
    pub image: String,
    /// Current state
    pub status: String,
    /// Desired state
    pub desired_state: String,
    /// Labels
    pub labels: Labels,
    /// Environment variables
    pub env: Env,
    /// Network attachments
    pub networks: ResourceList<Network>,
    #[serde(skip)]
    service_name: String,
}

impl Task {
    /// Create a task of the given service
    pub fn new(
        id: &str,
        service_id: &str,
        service_name: &str,
        slot: Option<u64>,
        node_id: &str,
    ) -> Self {
        let name = match slot {
            Some(slot) => format!("{}.{}.{}", service_name, slot, id),
            None => format!("{}.{}.{}", service_name, node_id, id),
        };

        let mut task = Self {
            id: id.to_string(),
            name,
            node_id: node_id.to_string(),
            service_id: service_id.to_string(),
            slot,
            status: "running".to_string(),
            desired_state: "running".to_string(),
            service_name: service_name.to_string(),
            ..Default::default()
        };
        task.apply_swarm_labels();
        task
    }

    /// Replace the spec labels, keeping the swarm identity labels on top
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self.apply_swarm_labels();
        self
    }

    /// Set the environment
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    /// Set the container ID
    pub fn container(mut self, container_id: &str) -> Self {
        self.container_id = container_id.to_string();
        self
    }

    /// Set the image
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Set current and desired state
    pub fn state(mut self, status: &str, desired_state: &str) -> Self {
        self.status = status.to_string();
        self.desired_state = desired_state.to_string();
        self
    }

    /// Attach to a network
    pub fn network(mut self, network: Network) -> Self {
        self.networks.push(Arc::new(network));
        self
    }

    fn apply_swarm_labels(&mut self) {
        self.labels.insert(SWARM_SERVICE_ID_LABEL, self.service_id.clone());
        self.labels.insert(SWARM_SERVICE_NAME_LABEL, self.service_name.clone());
        self.labels.insert(SWARM_TASK_ID_LABEL, self.id.clone());
        self.labels.insert(SWARM_TASK_NAME_LABEL, self.name.clone());
        self.labels.insert(SWARM_NODE_ID_LABEL, self.node_id.clone());
    }
}

impl Resource for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn env(&self) -> Option<&Env> {
        Some(&self.env)
    }

    fn matches_kind(&self, target: &str) -> bool {
        (!self.container_id.is_empty() && self.container_id == target)
            || self.service_id == target
            || matches_swarm_service(&self.labels, target)
    }
}

impl Networked for Task {
    fn network_ids(&self) -> Vec<&str> {
        self.networks.network_ids()
    }
}

impl ResourceList<Task> {
    /// Tasks whose current state equals `status`, ignoring case
    pub fn with_status(&self, status: &str) -> Self {
        self.filter(|task| task.status.eq_ignore_ascii_case(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_name() {
        let replicated = Task::new("t1", "s1", "web", Some(2), "n1");
        assert_eq!(replicated.name, "web.2.t1");

        let global = Task::new("t2", "s1", "web", None, "n1");
        assert_eq!(global.name, "web.n1.t2");
    }

    #[test]
    fn test_swarm_labels_survive_spec_labels() {
        let spec_labels = Labels::from_iter([
            ("app", "frontend"),
            (SWARM_SERVICE_NAME_LABEL, "spoofed"),
        ]);
        let task = Task::new("t1", "s1", "web", Some(1), "n1").with_labels(spec_labels);

        assert_eq!(task.labels.get("app"), "frontend");
        assert_eq!(task.labels.get(SWARM_SERVICE_NAME_LABEL), "web");
        assert_eq!(task.labels.get(SWARM_SERVICE_ID_LABEL), "s1");
        assert_eq!(task.labels.get(SWARM_TASK_NAME_LABEL), "web.1.t1");
        assert_eq!(task.labels.get(SWARM_NODE_ID_LABEL), "n1");
    }

    #[test]
    fn test_with_status() {
        let list = ResourceList::from(vec![
            Task::new("1", "s", "web", Some(1), "n"),
            Task::new("2", "s", "web", Some(2), "n"),
            Task::new("3", "s", "web", Some(3), "n").state("shutdown", "shutdown"),
        ]);

        assert_eq!(list.with_status("running").len(), 2);
        assert_eq!(list.with_status("Shutdown").len(), 1);
    }
}
