//! Runtime resource snapshots
//!
//! Every listing call against the runtime builds a fresh set of immutable
//! snapshots. Lists hold them behind `Arc`, and the `Arc` itself is the
//! identity of the underlying runtime object: two entries that share an
//! allocation are the same resource, whatever their ids say.

pub mod container;
pub mod labels;
pub mod list;
pub mod matching;
pub mod network;
pub mod node;
pub mod service;
pub mod task;

pub use container::{Container, Ports};
pub use labels::{Env, Labels};
pub use list::ResourceList;
pub use matching::Target;
pub use network::Network;
pub use node::Node;
pub use service::{EndpointPort, Ingress, Service, ServiceParts, VirtualIp};
pub use task::Task;

/// Label that routes an action target to a resource
pub const TARGET_LABEL: &str = "pygen.target";
/// Environment variable that routes an action target to a container or task
pub const TARGET_ENV: &str = "PYGEN_TARGET";

pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
pub const STACK_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";
pub const SWARM_SERVICE_ID_LABEL: &str = "com.docker.swarm.service.id";
pub const SWARM_SERVICE_NAME_LABEL: &str = "com.docker.swarm.service.name";
pub const SWARM_TASK_ID_LABEL: &str = "com.docker.swarm.task.id";
pub const SWARM_TASK_NAME_LABEL: &str = "com.docker.swarm.task.name";
pub const SWARM_NODE_ID_LABEL: &str = "com.docker.swarm.node.id";

/// Identity and routing attributes shared by every resource kind
pub trait Resource: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Abbreviated id as printed by the Docker CLI
    fn short_id(&self) -> &str {
        truncate_id(self.id(), 12)
    }

    fn labels(&self) -> &Labels;

    /// Environment consulted for `PYGEN_TARGET`; only containers and tasks have one
    fn env(&self) -> Option<&Env> {
        None
    }

    /// Kind-specific string rules, checked after the generic ones
    fn matches_kind(&self, _target: &str) -> bool {
        false
    }

    /// Membership test used when the target is a set of network ids
    fn in_networks(&self, _network_ids: &std::collections::BTreeSet<&str>) -> bool {
        false
    }
}

/// Resources attached to networks, usable as a network match target
pub trait Networked {
    fn network_ids(&self) -> Vec<&str>;
}

pub(crate) fn truncate_id(id: &str, len: usize) -> &str {
    match id.char_indices().nth(len) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Swarm service-name rules shared by containers and tasks
pub(crate) fn matches_swarm_service(labels: &Labels, target: &str) -> bool {
    let service_name = labels.get(SWARM_SERVICE_NAME_LABEL);
    if service_name.is_empty() {
        return false;
    }

    service_name == target || matches_stack_name(labels, service_name, target)
}

/// `<namespace>_<target>` when a stack namespace label is present
pub(crate) fn matches_stack_name(labels: &Labels, name: &str, target: &str) -> bool {
    match labels.get_opt(STACK_NAMESPACE_LABEL) {
        Some(namespace) => {
            name.len() == namespace.len() + 1 + target.len()
                && name.starts_with(namespace)
                && name[namespace.len()..].starts_with('_')
                && name.ends_with(target)
        }
        None => false,
    }
}
