//! Docker Engine client
//!
//! Wraps a `bollard` connection and converts the engine's models into
//! resource snapshots.

use super::{RuntimeClient, RuntimeEvent};
use crate::error::{PygenError, Result};
use crate::model::{
    Container, EndpointPort, Labels, Network, Node, Ports, ResourceList, Service, ServiceParts,
    Task, VirtualIp,
};
use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, KillContainerOptions, ListContainersOptions,
};
use bollard::errors::Error as EngineError;
use bollard::models::{
    ContainerInspectResponse, EventMessage, Network as EngineNetwork, Node as EngineNode,
    NetworkSettings, Service as EngineService, ServiceSpec, Task as EngineTask,
};
use bollard::network::ListNetworksOptions;
use bollard::node::ListNodesOptions;
use bollard::service::{InspectServiceOptions, ListServicesOptions, UpdateServiceOptions};
use bollard::system::EventsOptions;
use bollard::task::ListTasksOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Seconds before an engine request times out
const ENGINE_TIMEOUT: u64 = 120;

const EVENT_BUFFER: usize = 256;

/// Status code of an engine error response
fn status_code(error: &EngineError) -> Option<u16> {
    match error {
        EngineError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn text<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn labels(map: Option<HashMap<String, String>>) -> Labels {
    map.unwrap_or_default().into_iter().collect()
}

/// Container attachments ordered by network name
fn endpoint_networks(settings: Option<NetworkSettings>) -> Vec<Network> {
    let mut endpoints: Vec<_> = settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .collect();
    endpoints.sort_by(|a, b| a.0.cmp(&b.0));

    endpoints
        .into_iter()
        .map(|(name, endpoint)| {
            let network = Network::new(&text(endpoint.network_id), &name);
            match endpoint.ip_address.filter(|ip| !ip.is_empty()) {
                Some(ip) => network.address(&ip),
                None => network,
            }
        })
        .collect()
}

fn into_container(inspect: ContainerInspectResponse) -> Container {
    let config = inspect.config.unwrap_or_default();
    let state = inspect.state.unwrap_or_default();

    let mut container = Container::new(&text(inspect.id), &text(inspect.name))
        .image(&text(config.image));
    container.status = text(state.status);
    container.health = text(state.health.and_then(|health| health.status));
    container.labels = labels(config.labels);
    container.env = Labels::from_env_entries(config.env.unwrap_or_default());
    container.ports = Ports::from_exposed(config.exposed_ports.unwrap_or_default().keys());

    for network in endpoint_networks(inspect.network_settings) {
        container = container.network(network);
    }

    container
}

/// Network descriptors by ID, from the engine's network listing
fn network_index(networks: Vec<EngineNetwork>) -> HashMap<String, Network> {
    networks
        .into_iter()
        .filter_map(|engine| {
            let id = engine.id?;
            let mut network = Network::new(&id, &text(engine.name));
            network.labels = labels(engine.labels);
            network.is_ingress = engine.ingress.unwrap_or(false);
            Some((id, network))
        })
        .collect()
}

/// Networks of one task
///
/// Attachments of the task's container come first when it runs on this
/// engine, carrying its addresses. Declared targets the container does not
/// report follow without addresses.
fn task_networks(
    targets: &[String],
    local: Vec<Network>,
    index: &HashMap<String, Network>,
) -> Vec<Network> {
    let describe = |mut network: Network| {
        if let Some(known) = index.get(&network.id) {
            if network.name.is_empty() {
                network.name = known.name.clone();
            }
            network.labels = known.labels.clone();
            network.is_ingress = known.is_ingress;
        }
        network
    };

    let mut attached: Vec<Network> = local.into_iter().map(describe).collect();
    for target in targets {
        if !attached.iter().any(|network| &network.id == target) {
            attached.push(describe(Network::new(target, "")));
        }
    }
    attached
}

/// Service pieces without tasks
fn service_parts(service: EngineService) -> ServiceParts {
    let spec = service.spec.unwrap_or_default();
    let template = spec.task_template.unwrap_or_default();
    let container_spec = template.container_spec.unwrap_or_default();

    let target_networks = template
        .networks
        .unwrap_or_default()
        .into_iter()
        .chain(spec.networks.unwrap_or_default())
        .filter_map(|network| network.target)
        .collect();

    let virtual_ips = service
        .endpoint
        .and_then(|endpoint| endpoint.virtual_ips)
        .unwrap_or_default()
        .into_iter()
        .map(|vip| VirtualIp {
            network_id: text(vip.network_id),
            addr: text(vip.addr),
        })
        .collect();

    let endpoint_ports = spec
        .endpoint_spec
        .and_then(|endpoint| endpoint.ports)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|port| {
            let target_port = u16::try_from(port.target_port?).ok()?;
            let protocol = text(port.protocol);
            let publish_mode = text(port.publish_mode);
            Some(EndpointPort {
                protocol: if protocol.is_empty() { "tcp".to_string() } else { protocol },
                target_port,
                published_port: port.published_port.and_then(|p| u16::try_from(p).ok()),
                publish_mode: if publish_mode.is_empty() {
                    "ingress".to_string()
                } else {
                    publish_mode
                },
            })
        })
        .collect();

    ServiceParts {
        id: text(service.id),
        name: text(spec.name),
        image: text(container_spec.image),
        labels: labels(spec.labels),
        tasks: Vec::new(),
        target_networks,
        virtual_ips,
        endpoint_ports,
    }
}

/// ID of the container running `task`, if it has one yet
fn task_container_id(task: &EngineTask) -> Option<&str> {
    task.status
        .as_ref()?
        .container_status
        .as_ref()?
        .container_id
        .as_deref()
        .filter(|id| !id.is_empty())
}

fn into_task(task: EngineTask, parts: &ServiceParts, networks: Vec<Network>) -> Task {
    let container_id = task_container_id(&task).unwrap_or_default().to_string();
    let container_spec = task
        .spec
        .and_then(|spec| spec.container_spec)
        .unwrap_or_default();
    let status = task.status.unwrap_or_default();
    let slot = task.slot.and_then(|slot| u64::try_from(slot).ok());

    let mut converted = Task::new(
        &text(task.id),
        &parts.id,
        &parts.name,
        slot,
        &text(task.node_id),
    )
    .with_labels(labels(container_spec.labels))
    .with_env(Labels::from_env_entries(container_spec.env.unwrap_or_default()))
    .container(&container_id)
    .image(&text(container_spec.image))
    .state(&text(status.state), &text(task.desired_state));

    for network in networks {
        converted = converted.network(network);
    }
    converted
}

fn into_node(node: EngineNode) -> Node {
    let spec = node.spec.unwrap_or_default();
    let status = node.status.unwrap_or_default();
    let hostname = text(node.description.and_then(|description| description.hostname));

    Node::new(&text(node.id), &hostname)
        .role(&text(spec.role))
        .availability(&text(spec.availability))
        .state(&text(status.state))
        .address(&text(status.addr))
        .version(&text(node.version.and_then(|version| version.index)))
        .with_labels(labels(spec.labels))
}

fn into_event(message: EventMessage) -> RuntimeEvent {
    RuntimeEvent {
        kind: text(message.typ),
        status: text(message.action),
        actor_id: text(message.actor.and_then(|actor| actor.id)),
        time: message
            .time
            .and_then(|time| DateTime::from_timestamp(time, 0))
            .unwrap_or_else(Utc::now),
    }
}

/// `TaskTemplate.ForceUpdate = (ForceUpdate + 1) % 100`
fn bump_force_update(spec: &mut ServiceSpec) -> Option<()> {
    let template = spec.task_template.as_mut()?;
    let current = template.force_update.unwrap_or(0).rem_euclid(100);
    template.force_update = Some((current + 1) % 100);
    Some(())
}

/// Connect to a `DOCKER_HOST` style endpoint
fn connect(host: &str) -> Result<Docker> {
    let host = host.trim();

    let docker = if host.starts_with("unix://") {
        Docker::connect_with_unix(host, ENGINE_TIMEOUT, API_DEFAULT_VERSION)?
    } else if host.starts_with("tcp://") || host.starts_with("http://") {
        Docker::connect_with_http(host, ENGINE_TIMEOUT, API_DEFAULT_VERSION)?
    } else {
        return Err(PygenError::Config(format!(
            "Unsupported Docker host, expected unix://, tcp:// or http://: {}",
            host
        )));
    };

    Ok(docker)
}

/// Docker Engine client
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to `host` (`unix://`, `tcp://` or `http://`)
    pub fn new(host: &str) -> Result<Self> {
        let docker = connect(host)?;
        debug!("Using Docker engine at {}", host);
        Ok(Self { docker })
    }

    /// Connect through `DOCKER_HOST`, or the local engine socket when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var("DOCKER_HOST") {
            Ok(host) if !host.trim().is_empty() => Self::new(&host),
            _ => {
                debug!("Using local Docker engine");
                Ok(Self {
                    docker: Docker::connect_with_local_defaults()?,
                })
            }
        }
    }

    async fn networks(&self) -> HashMap<String, Network> {
        match self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
        {
            Ok(networks) => network_index(networks),
            Err(e) => {
                debug!("Networks unavailable: {}", e);
                HashMap::new()
            }
        }
    }

    /// Attachments of a task's container when it runs on this engine
    async fn local_task_networks(&self, task: &EngineTask) -> Vec<Network> {
        let Some(container_id) = task_container_id(task) else {
            return Vec::new();
        };

        match self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => endpoint_networks(inspect.network_settings),
            Err(e) => {
                debug!("Task container {} is not local: {}", container_id, e);
                Vec::new()
            }
        }
    }

    async fn tasks(&self, service_id: &str, desired_state: &str) -> Result<Vec<EngineTask>> {
        let mut filters = HashMap::new();
        filters.insert("service".to_string(), vec![service_id.to_string()]);
        if !desired_state.is_empty() {
            filters.insert("desired-state".to_string(), vec![desired_state.to_string()]);
        }

        Ok(self
            .docker
            .list_tasks(Some(ListTasksOptions { filters }))
            .await?)
    }
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn containers(&self) -> Result<ResourceList<Container>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|summary| summary.id) {
            match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => containers.push(into_container(inspect)),
                // removed between listing and inspection
                Err(e) => debug!("Skipping container {}: {}", id, e),
            }
        }

        Ok(ResourceList::from(containers))
    }

    async fn services(&self, desired_task_state: &str) -> Result<ResourceList<Service>> {
        let services = match self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
        {
            Ok(services) => services,
            Err(e) if status_code(&e) == Some(503) => {
                debug!("Engine is not a swarm manager: {}", e);
                return Ok(ResourceList::new());
            }
            Err(e) => return Err(e.into()),
        };

        let index = self.networks().await;

        let mut assembled = Vec::with_capacity(services.len());
        for service in services {
            let mut parts = service_parts(service);
            for task in self.tasks(&parts.id, desired_task_state).await? {
                let local = self.local_task_networks(&task).await;
                let networks = task_networks(&parts.target_networks, local, &index);
                let task = into_task(task, &parts, networks);
                parts.tasks.push(task);
            }
            assembled.push(Service::assemble(parts));
        }

        Ok(ResourceList::from(assembled))
    }

    async fn nodes(&self) -> Result<ResourceList<Node>> {
        match self.docker.list_nodes(None::<ListNodesOptions<String>>).await {
            Ok(nodes) => Ok(nodes.into_iter().map(into_node).collect::<Vec<_>>().into()),
            Err(e) if status_code(&e) == Some(503) => {
                debug!("Engine is not a swarm manager: {}", e);
                Ok(ResourceList::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn restart_container(&self, id: &str) -> Result<()> {
        match self.docker.restart_container(id, None::<bollard::query_parameters::RestartContainerOptions>).await {
            Err(e) if status_code(&e) == Some(404) => {
                Err(PygenError::ContainerNotFound(id.to_string()))
            }
            result => Ok(result?),
        }
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        let options = KillContainerOptions { signal };
        match self.docker.kill_container(id, Some(options)).await {
            Err(e) if status_code(&e) == Some(404) => {
                Err(PygenError::ContainerNotFound(id.to_string()))
            }
            result => Ok(result?),
        }
    }

    async fn force_update_service(&self, id: &str) -> Result<()> {
        let service = match self
            .docker
            .inspect_service(id, None::<InspectServiceOptions>)
            .await
        {
            Err(e) if status_code(&e) == Some(404) => {
                return Err(PygenError::ServiceNotFound(id.to_string()))
            }
            result => result?,
        };

        let version = service
            .version
            .and_then(|version| version.index)
            .ok_or_else(|| PygenError::Runtime(format!("Service {} has no version", id)))?;

        let mut spec = service
            .spec
            .ok_or_else(|| PygenError::Runtime(format!("Service {} has no spec", id)))?;
        bump_force_update(&mut spec)
            .ok_or_else(|| PygenError::Runtime(format!("Service {} has no task template", id)))?;

        let options = UpdateServiceOptions {
            version,
            ..Default::default()
        };
        self.docker.update_service(id, spec, options, None).await?;

        debug!("Forced update of service {} at version {}", id, version);
        Ok(())
    }

    async fn events(&self) -> Result<mpsc::Receiver<RuntimeEvent>> {
        let docker = self.docker.clone();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let mut stream = Box::pin(docker.events(None::<EventsOptions<String>>));
            while let Some(message) = stream.next().await {
                match message {
                    Ok(message) => {
                        if tx.send(into_event(message)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Event stream failed: {}", e);
                        return;
                    }
                }
            }
            debug!("Event stream closed");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Resource, SWARM_SERVICE_NAME_LABEL};
    use serde_json::json;

    #[tokio::test]
    async fn test_connect_endpoints() {
        assert!(DockerClient::new("unix:///var/run/docker.sock").is_ok());
        assert!(DockerClient::new("tcp://10.0.0.1:2375").is_ok());
        assert!(DockerClient::new("http://docker:2375").is_ok());
        assert!(matches!(
            DockerClient::new("ftp://docker"),
            Err(PygenError::Config(_))
        ));
        assert!(DockerClient::new("docker").is_err());
    }

    #[test]
    fn test_container_inspect() {
        let inspect: ContainerInspectResponse = serde_json::from_value(json!({
            "Id": "abcdef0123456789",
            "Name": "/web",
            "Config": {
                "Image": "nginx:latest",
                "Labels": {"com.docker.compose.service": "web"},
                "Env": ["PATH=/usr/bin", "PYGEN_TARGET=proxy", "EMPTY"],
                "ExposedPorts": {"80/tcp": {}, "53/udp": {}}
            },
            "State": {"Status": "running", "Health": {"Status": "healthy"}},
            "NetworkSettings": {
                "Networks": {
                    "frontend": {"NetworkID": "n1", "IPAddress": "172.18.0.2"},
                    "backend": {"NetworkID": "n2", "IPAddress": ""}
                }
            }
        }))
        .unwrap();

        let container = into_container(inspect);

        assert_eq!(container.name, "web");
        assert_eq!(container.short_id(), "abcdef012345");
        assert_eq!(container.image, "nginx:latest");
        assert_eq!(container.status, "running");
        assert!(container.is_healthy());
        assert_eq!(container.env.get("PYGEN_TARGET"), "proxy");
        assert_eq!(container.env.get("EMPTY"), "");
        assert_eq!(container.ports.tcp, vec![80]);
        assert_eq!(container.ports.udp, vec![53]);

        let names: Vec<&str> = container.networks.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["backend", "frontend"]);
        assert_eq!(container.networks.last().unwrap().ip_address(), "172.18.0.2");
    }

    #[test]
    fn test_null_labels_and_env() {
        let inspect: ContainerInspectResponse = serde_json::from_value(json!({
            "Id": "c1",
            "Name": "/db",
            "Config": {"Image": "postgres", "Labels": null, "Env": null},
            "State": {"Status": "running"},
            "NetworkSettings": {"Networks": null}
        }))
        .unwrap();

        let container = into_container(inspect);
        assert!(container.labels.is_empty());
        assert_eq!(container.health, "");
        assert!(container.networks.is_empty());
    }

    fn engine_service() -> EngineService {
        serde_json::from_value(json!({
            "ID": "svc1",
            "Version": {"Index": 12},
            "Spec": {
                "Name": "st01_web",
                "Labels": {"com.docker.stack.namespace": "st01"},
                "TaskTemplate": {
                    "ContainerSpec": {"Image": "nginx", "Labels": {"tier": "front"}},
                    "Networks": [{"Target": "back"}],
                    "ForceUpdate": 0
                },
                "EndpointSpec": {
                    "Ports": [{"Protocol": "tcp", "TargetPort": 80, "PublishedPort": 8080, "PublishMode": "ingress"}]
                }
            },
            "Endpoint": {
                "VirtualIPs": [
                    {"NetworkID": "ing", "Addr": "10.255.0.4/16"},
                    {"NetworkID": "back", "Addr": "10.0.2.2/24"}
                ]
            }
        }))
        .unwrap()
    }

    fn engine_task() -> EngineTask {
        serde_json::from_value(json!({
            "ID": "task1",
            "ServiceID": "svc1",
            "NodeID": "node1",
            "Slot": 1,
            "Spec": {"ContainerSpec": {"Image": "nginx", "Env": ["A=1"]}},
            "Status": {"State": "running", "ContainerStatus": {"ContainerID": "cont1"}},
            "DesiredState": "running"
        }))
        .unwrap()
    }

    fn engine_networks() -> HashMap<String, Network> {
        network_index(
            serde_json::from_value(json!([
                {"Id": "ing", "Name": "ingress", "Ingress": true},
                {"Id": "back", "Name": "backend", "Labels": {"tier": "db"}}
            ]))
            .unwrap(),
        )
    }

    #[test]
    fn test_service_assembly() {
        let mut parts = service_parts(engine_service());
        let task = engine_task();
        assert_eq!(task_container_id(&task), Some("cont1"));

        let local = vec![
            Network::new("ing", "ingress").address("10.255.0.9/16"),
            Network::new("back", "backend").address("10.0.2.5/24"),
        ];
        let networks = task_networks(&parts.target_networks, local, &engine_networks());
        let task = into_task(task, &parts, networks);
        parts.tasks.push(task);

        let service = Service::assemble(parts);

        assert_eq!(service.image, "nginx");
        assert_eq!(service.ingress.gateway, "10.255.0.4");
        assert_eq!(service.ingress.ip_addresses, vec!["10.255.0.9"]);
        assert_eq!(service.ingress.ports.tcp, vec![8080]);
        assert_eq!(service.ports.tcp, vec![80]);

        let backend = service.networks.first().unwrap();
        assert_eq!(backend.name, "backend");
        assert_eq!(backend.gateway, "10.0.2.2");
        assert_eq!(backend.ip_addresses, vec!["10.0.2.5"]);
        assert_eq!(backend.labels.get("tier"), "db");

        let task = service.tasks.first().unwrap();
        assert_eq!(task.name, "st01_web.1.task1");
        assert_eq!(task.container_id, "cont1");
        assert_eq!(task.labels.get("tier"), "front");
        assert_eq!(task.labels.get(SWARM_SERVICE_NAME_LABEL), "st01_web");
        assert_eq!(task.env.get("A"), "1");
    }

    #[test]
    fn test_remote_task_falls_back_to_targets() {
        let parts = service_parts(engine_service());
        let networks = task_networks(&parts.target_networks, Vec::new(), &engine_networks());

        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].id, "back");
        assert_eq!(networks[0].name, "backend");
        assert!(networks[0].ip_addresses.is_empty());
    }

    #[test]
    fn test_node() {
        let node: EngineNode = serde_json::from_value(json!({
            "ID": "node0123456789",
            "Version": {"Index": 7},
            "Spec": {"Role": "manager", "Availability": "active", "Labels": {}},
            "Description": {"Hostname": ""},
            "Status": {"State": "ready", "Addr": "192.168.1.10"}
        }))
        .unwrap();

        let node = into_node(node);
        assert_eq!(node.name, "node012345");
        assert_eq!(node.version, "7");
        assert_eq!(node.address, "192.168.1.10");
        assert!(node.is_manager());
    }

    #[test]
    fn test_event() {
        let message: EventMessage = serde_json::from_value(json!({
            "Type": "container",
            "Action": "health_status: healthy",
            "Actor": {"ID": "c1", "Attributes": {}},
            "time": 1700000000
        }))
        .unwrap();

        let event = into_event(message);
        assert_eq!(event.kind, "container");
        assert_eq!(event.status, "health_status: healthy");
        assert_eq!(event.actor_id, "c1");
        assert_eq!(event.time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_bump_force_update() {
        let mut spec: ServiceSpec =
            serde_json::from_value(json!({"TaskTemplate": {"ForceUpdate": 99}})).unwrap();
        bump_force_update(&mut spec).unwrap();
        assert_eq!(spec.task_template.as_ref().unwrap().force_update, Some(0));

        let mut spec: ServiceSpec = serde_json::from_value(json!({"TaskTemplate": {}})).unwrap();
        bump_force_update(&mut spec).unwrap();
        assert_eq!(spec.task_template.as_ref().unwrap().force_update, Some(1));

        assert!(bump_force_update(&mut ServiceSpec::default()).is_none());
    }
}
