//! Swarm node snapshots

use super::{Labels, Resource};
use serde::Serialize;

/// Swarm node
#[derive(Debug, Clone, Default, Serialize)]
pub struct Node {
    /// Node ID
    pub id: String,
    /// Hostname, or the short ID when the node reports none
    pub name: String,
    pub hostname: String,
    /// `manager` or `worker`
    pub role: String,
    /// `active`, `pause` or `drain`
    pub availability: String,
    /// `ready`, `down`, ...
    pub state: String,
    /// Node address
    pub address: String,
    /// Object version index
    pub version: String,
    pub labels: Labels,
}

impl Node {
    pub fn new(id: &str, hostname: &str) -> Self {
        let name = if hostname.is_empty() {
            super::truncate_id(id, 10).to_string()
        } else {
            hostname.to_string()
        };

        Self {
            id: id.to_string(),
            name,
            hostname: hostname.to_string(),
            role: "worker".to_string(),
            availability: "active".to_string(),
            state: "ready".to_string(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn availability(mut self, availability: &str) -> Self {
        self.availability = availability.to_string();
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = state.to_string();
        self
    }

    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn is_manager(&self) -> bool {
        self.role == "manager"
    }
}

impl Resource for Node {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn short_id(&self) -> &str {
        super::truncate_id(&self.id, 10)
    }

    fn labels(&self) -> &Labels {
        &self.labels
    }
}
