//! Network attachment descriptors

use super::{Labels, Networked, Resource, ResourceList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A network as seen from a container, task or service attachment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    /// Network ID
    pub id: String,
    /// Network name
    pub name: String,
    /// Network labels
    #[serde(default)]
    pub labels: Labels,
    /// Gateway (virtual IP for service networks)
    #[serde(default)]
    pub gateway: String,
    /// Addresses on this network, without prefix length
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Swarm ingress network
    #[serde(default)]
    pub is_ingress: bool,
}

impl Network {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add an address, dropping any `/prefix` suffix
    pub fn address(mut self, address: &str) -> Self {
        self.ip_addresses.push(strip_prefix_len(address).to_string());
        self
    }

    /// First address on the network, or `""`
    pub fn ip_address(&self) -> &str {
        self.ip_addresses.first().map(String::as_str).unwrap_or("")
    }
}

impl Resource for Network {
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

    fn in_networks(&self, network_ids: &BTreeSet<&str>) -> bool {
        network_ids.contains(self.id.as_str())
    }
}

impl Networked for Network {
    fn network_ids(&self) -> Vec<&str> {
        vec![self.id.as_str()]
    }
}

impl Networked for ResourceList<Network> {
    fn network_ids(&self) -> Vec<&str> {
        self.iter().map(|network| network.id.as_str()).collect()
    }
}

/// `10.0.0.5/24` -> `10.0.0.5`
pub(crate) fn strip_prefix_len(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}
