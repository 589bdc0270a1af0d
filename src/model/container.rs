//! Container snapshots

use super::{
    matches_swarm_service, Env, Labels, Network, Networked, Resource, ResourceList,
    COMPOSE_SERVICE_LABEL,
};
use serde::{Deserialize, Serialize};

/// Exposed ports grouped by protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    #[serde(default)]
    pub tcp: Vec<u16>,
    #[serde(default)]
    pub udp: Vec<u16>,
}

impl Ports {
    /// Parse Docker's `"80/tcp"` style keys; unknown protocols are ignored
    pub fn from_exposed<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ports = Ports::default();
        for key in keys {
            let Some((port, protocol)) = key.as_ref().split_once('/') else {
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                continue;
            };
            ports.add(protocol, port);
        }
        ports
    }

    /// Record a port under `tcp` or `udp`
    pub fn add(&mut self, protocol: &str, port: u16) {
        match protocol {
            "tcp" => self.tcp.push(port),
            "udp" => self.udp.push(port),
            _ => {}
        }
    }
}

/// Running container snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct Container {
    /// Container ID
    pub id: String,
    /// Container name, without the leading `/`
    pub name: String,
    /// Image reference
    pub image: String,
    /// Runtime status (`running`, `exited`, ...)
    pub status: String,
    /// Health status, empty when the image has no health check
    pub health: String,
    /// Container labels
    pub labels: Labels,
    /// Environment variables
    pub env: Env,
    /// Network attachments
    pub networks: ResourceList<Network>,
    /// Exposed ports
    pub ports: Ports,
}

impl Container {
    /// Create a container snapshot
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.trim_start_matches('/').to_string(),
            status: "running".to_string(),
            ..Default::default()
        }
    }

    /// Set the image
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Add a label
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key, value);
        self
    }

    /// Add an environment variable
    pub fn env_var(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key, value);
        self
    }

    /// Set the health status
    pub fn health(mut self, health: &str) -> Self {
        self.health = health.to_string();
        self
    }

    /// Attach to a network
    pub fn network(mut self, network: Network) -> Self {
        self.networks.push(std::sync::Arc::new(network));
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.health.eq_ignore_ascii_case("healthy")
    }
}

impl Resource for Container {
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
        self.labels.get_opt(COMPOSE_SERVICE_LABEL) == Some(target)
            || matches_swarm_service(&self.labels, target)
    }
}

impl Networked for Container {
    fn network_ids(&self) -> Vec<&str> {
        self.networks.network_ids()
    }
}

impl ResourceList<Container> {
    /// Containers whose health status equals `status`, ignoring case
    pub fn with_health(&self, status: &str) -> Self {
        self.filter(|container| container.health.eq_ignore_ascii_case(status))
    }

    pub fn healthy(&self) -> Self {
        self.with_health("healthy")
    }
}
