//! Swarm service snapshots

use super::network::strip_prefix_len;
use super::{
    matches_stack_name, Labels, Network, Networked, Ports, Resource, ResourceList, Task,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Routing mesh attachment of a service
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ingress {
    /// Ingress network ID
    pub id: String,
    /// Ingress network name
    pub name: String,
    /// Virtual IP of the service on the ingress network
    pub gateway: String,
    /// Ports published through the routing mesh
    pub ports: Ports,
    /// Task addresses on the ingress network
    pub ip_addresses: Vec<String>,
}

/// Virtual IP assigned to a service on one network
#[derive(Debug, Clone)]
pub struct VirtualIp {
    pub network_id: String,
    /// Address with prefix length, as reported by the endpoint
    pub addr: String,
}

/// Port from the service endpoint spec
#[derive(Debug, Clone)]
pub struct EndpointPort {
    pub protocol: String,
    pub target_port: u16,
    pub published_port: Option<u16>,
    /// `ingress` or `host`
    pub publish_mode: String,
}

/// Raw service pieces as reported by the runtime
#[derive(Debug, Clone, Default)]
pub struct ServiceParts {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: Labels,
    pub tasks: Vec<Task>,
    /// Network targets from the service spec and its task template
    pub target_networks: Vec<String>,
    pub virtual_ips: Vec<VirtualIp>,
    pub endpoint_ports: Vec<EndpointPort>,
}

/// Swarm service
#[derive(Debug, Clone, Default, Serialize)]
pub struct Service {
    /// Service ID
    pub id: String,
    /// Service name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Service labels
    pub labels: Labels,
    /// Tasks in the requested desired state
    pub tasks: ResourceList<Task>,
    /// Target ports by protocol
    pub ports: Ports,
    /// Attached networks, excluding ingress
    pub networks: ResourceList<Network>,
    /// Routing mesh details
    pub ingress: Ingress,
}

impl Service {
    /// Assemble a service from its runtime pieces
    ///
    /// The ingress network is either flagged as such on a task attachment or,
    /// for older engines, the only virtual IP network that is not one of the
    /// service's declared targets.
    pub fn assemble(parts: ServiceParts) -> Self {
        let ServiceParts {
            id,
            name,
            image,
            labels,
            mut tasks,
            target_networks,
            virtual_ips,
            endpoint_ports,
        } = parts;

        let targets: BTreeSet<&str> = target_networks.iter().map(String::as_str).collect();

        let probable_ingress = virtual_ips
            .iter()
            .filter(|vip| !targets.contains(vip.network_id.as_str()))
            .last()
            .map(|vip| vip.network_id.clone());

        let mut ingress = Ingress::default();
        for task in tasks.iter_mut() {
            let mut attached = ResourceList::new();
            for network in task.networks.iter() {
                let is_probable = probable_ingress.as_deref() == Some(network.id.as_str());
                if network.is_ingress || is_probable {
                    ingress.id = network.id.clone();
                    ingress.name = network.name.clone();
                    ingress.ip_addresses.extend(network.ip_addresses.iter().cloned());
                }
                if is_probable && !network.is_ingress {
                    let mut flagged = Network::clone(network);
                    flagged.is_ingress = true;
                    attached.push(Arc::new(flagged));
                } else {
                    attached.push(Arc::clone(network));
                }
            }
            task.networks = attached;
        }

        if !ingress.id.is_empty() {
            if let Some(vip) = virtual_ips.iter().find(|vip| vip.network_id == ingress.id) {
                ingress.gateway = strip_prefix_len(&vip.addr).to_string();
            }
        }

        let mut declared = BTreeSet::new();
        let mut networks = ResourceList::new();
        for network_id in target_networks.iter().filter(|id| declared.insert(id.as_str())) {
            let mut network = Network::new(network_id, "");
            if let Some(vip) = virtual_ips.iter().find(|vip| vip.network_id == *network_id) {
                network.gateway = strip_prefix_len(&vip.addr).to_string();
            }
            for attachment in tasks.iter().flat_map(|task| task.networks.iter()) {
                if attachment.id == *network_id {
                    network.name = attachment.name.clone();
                    network.labels = attachment.labels.clone();
                    network
                        .ip_addresses
                        .extend(attachment.ip_addresses.iter().cloned());
                }
            }
            networks.push(Arc::new(network));
        }

        let mut ports = Ports::default();
        for port in &endpoint_ports {
            if port.publish_mode == "ingress" {
                if let Some(published) = port.published_port.filter(|p| *p > 0) {
                    ingress.ports.add(&port.protocol, published);
                }
            }
            ports.add(&port.protocol, port.target_port);
        }

        Self {
            id,
            name,
            image,
            labels,
            tasks: ResourceList::from(tasks),
            ports,
            networks,
            ingress,
        }
    }
}

impl Resource for Service {
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

    fn matches_kind(&self, target: &str) -> bool {
        matches_stack_name(&self.labels, &self.name, target)
    }
}

impl Networked for Service {
    fn network_ids(&self) -> Vec<&str> {
        self.networks.network_ids()
    }
}
