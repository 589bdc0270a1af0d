//! Worker side of action dispatch
//!
//! A worker executes actions sent by the manager against its own runtime
//! and tells the manager when its local containers change.

use super::http::{HttpRequest, HttpResponse, HttpServer, RequestHandler};
use super::manager::deliver;
use super::protocol::ActionRequest;
use crate::actions::ActionExecutor;
use crate::config::WorkerConfig;
use crate::error::{PygenError, Result};
use crate::runtime::{EventFilter, RuntimeClient, RuntimeEvent};
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Inbound worker endpoint: decodes an [`ActionRequest`] and runs it locally
pub struct ActionEndpoint {
    executor: Arc<ActionExecutor>,
}

impl ActionEndpoint {
    pub fn new(executor: Arc<ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl RequestHandler for ActionEndpoint {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let request = match ActionRequest::from_bytes(&request.body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Invalid action request: {}", e);
                return HttpResponse::error(400, &e.to_string());
            }
        };

        info!(
            "Received {} action ({})",
            request.action,
            request.args.join(" ")
        );

        match self.executor.execute(&request.action, &request.args).await {
            Ok(()) => HttpResponse::ok(),
            Err(e) => {
                error!("Failed to execute {} action: {}", request.action, e);
                HttpResponse::error(400, &e.to_string())
            }
        }
    }
}

/// Swarm worker
pub struct Worker {
    manager_url: String,
    worker_port: u16,
    retries: u32,
    client: reqwest::Client,
    runtime: Arc<dyn RuntimeClient>,
    events: EventFilter,
}

impl Worker {
    pub fn new(config: &WorkerConfig, runtime: Arc<dyn RuntimeClient>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            manager_url: format!("http://{}:{}/", config.manager, config.swarm.manager_port),
            worker_port: config.swarm.worker_port,
            retries: config.swarm.retries,
            client: config.swarm.http_client()?,
            runtime,
            events: config.events.clone(),
        })
    }

    pub fn manager_url(&self) -> &str {
        &self.manager_url
    }

    /// Start the action endpoint on all interfaces
    pub async fn serve(&self) -> Result<HttpServer> {
        self.serve_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.worker_port)))
            .await
    }

    pub async fn serve_on(&self, addr: SocketAddr) -> Result<HttpServer> {
        let executor = Arc::new(ActionExecutor::new(Arc::clone(&self.runtime)));
        HttpServer::bind(addr, Arc::new(ActionEndpoint::new(executor))).await
    }

    /// Ask the manager to regenerate; `true` once it acknowledged
    pub async fn send_update(&self) -> bool {
        deliver(
            &self.client,
            &self.manager_url,
            Vec::new(),
            self.retries,
            "Update",
        )
        .await
        .delivered
    }

    /// Notify the manager on every watched runtime event
    ///
    /// Returns an error once the event stream ends.
    pub async fn watch_events(&self) -> Result<()> {
        let events = self.runtime.events().await?;
        info!("Starting event watch loop");
        self.forward_events(events).await
    }

    pub(crate) async fn forward_events(
        &self,
        mut events: mpsc::Receiver<RuntimeEvent>,
    ) -> Result<()> {
        while let Some(event) = events.recv().await {
            if !self.events.matches(&event) {
                continue;
            }

            debug!("Event {} on {}, notifying manager", event.status, event.actor_id);
            self.send_update().await;
        }

        Err(PygenError::Runtime("Event stream ended".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Container;
    use crate::runtime::memory::Mutation;
    use crate::runtime::MemoryRuntime;
    use crate::swarm::manager::{UpdateEndpoint, UpdateTrigger};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl UpdateTrigger for Counter {
        async fn trigger_update(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runtime() -> Arc<MemoryRuntime> {
        Arc::new(
            MemoryRuntime::new()
                .with_container(Container::new("c1", "web"))
                .with_container(Container::new("c2", "db")),
        )
    }

    async fn post(server: &HttpServer, body: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}/", server.local_addr()))
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_action_endpoint_runs_locally() {
        let runtime = runtime();
        let worker = Worker::new(&WorkerConfig::new("manager"), runtime.clone()).unwrap();
        let server = worker.serve_on("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let response = post(&server, r#"{"action": "signal", "args": ["web", "HUP"]}"#).await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK\n");
        assert_eq!(
            runtime.mutations(),
            vec![Mutation::Kill {
                id: "c1".to_string(),
                signal: "HUP".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_action_endpoint_rejects_bad_requests() {
        let runtime = runtime();
        let worker = Worker::new(&WorkerConfig::new("manager"), runtime.clone()).unwrap();
        let server = worker.serve_on("127.0.0.1:0".parse().unwrap()).await.unwrap();

        assert_eq!(post(&server, "not json").await.status(), 400);
        assert_eq!(post(&server, r#"{"action": "reload", "args": ["web"]}"#).await.status(), 400);
        assert_eq!(post(&server, r#"{"action": "restart", "args": []}"#).await.status(), 400);
        assert!(runtime.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_watched_events_notify_manager() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let manager = HttpServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(UpdateEndpoint::new(counter.clone())),
        )
        .await
        .unwrap();

        let mut config = WorkerConfig::new("127.0.0.1");
        config.swarm.manager_port = manager.local_addr().port();
        let worker = Worker::new(&config, runtime()).unwrap();

        let (tx, rx) = mpsc::channel(8);
        tx.send(RuntimeEvent::container("start", "c1")).await.unwrap();
        tx.send(RuntimeEvent::container("exec_create: sh", "c1")).await.unwrap();
        tx.send(RuntimeEvent::container("die", "c2")).await.unwrap();
        drop(tx);

        let result = worker.forward_events(rx).await;

        assert!(matches!(result, Err(PygenError::Runtime(_))));
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_send_update_unreachable_manager() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = WorkerConfig::new("127.0.0.1");
        config.swarm.manager_port = port;
        config.swarm.retries = 1;
        let worker = Worker::new(&config, runtime()).unwrap();

        assert!(!worker.send_update().await);
    }

    #[test]
    fn test_manager_url() {
        let worker = Worker::new(&WorkerConfig::new("pygen-manager"), runtime()).unwrap();
        assert_eq!(worker.manager_url(), "http://pygen-manager:9411/");
        assert!(Worker::new(&WorkerConfig::new(""), runtime()).is_err());
    }
}
