//! Manager side of action dispatch
//!
//! The manager fans action requests out to every address its worker
//! hostnames resolve to, and serves the update endpoint workers call when
//! their local state changes.

use super::http::{HttpRequest, HttpResponse, RequestHandler};
use super::protocol::ActionRequest;
use crate::config::SwarmConfig;
use crate::error::{PygenError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Resolves worker hostnames to socket addresses
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;
}

/// System resolver; `tasks.<service>` names fan out to every task
pub struct DnsResolver;

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let addresses = tokio::net::lookup_host((host, port)).await?;
        Ok(addresses.collect())
    }
}

/// Result of one delivery with retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    pub attempts: u32,
}

/// POST `body` to `url` until it answers 200 or the retry budget is spent
///
/// Attempts follow each other without delay. Every outcome is logged.
pub(crate) async fn deliver(
    client: &reqwest::Client,
    url: &str,
    body: Vec<u8>,
    retries: u32,
    what: &str,
) -> Delivery {
    let budget = retries.saturating_add(1);
    let mut attempts = 0;

    while attempts < budget {
        attempts += 1;

        match client.post(url).body(body.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status == reqwest::StatusCode::OK {
                    info!("{} sent to {} : HTTP {} : {}", what, url, status.as_u16(), text.trim());
                    return Delivery {
                        delivered: true,
                        attempts,
                    };
                }
                warn!(
                    "{} to {} failed (attempt {}/{}) : HTTP {} : {}",
                    what,
                    url,
                    attempts,
                    budget,
                    status.as_u16(),
                    text.trim()
                );
            }
            Err(e) => {
                warn!(
                    "{} to {} failed (attempt {}/{}) : {}",
                    what,
                    url,
                    attempts,
                    budget,
                    e
                );
            }
        }
    }

    error!("Giving up on {} to {} after {} attempts", what, url, attempts);
    Delivery {
        delivered: false,
        attempts,
    }
}

/// Outcome of a [`Manager::send_action`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Addresses that acknowledged the action
    pub delivered: Vec<SocketAddr>,
    /// Addresses that never acknowledged it
    pub failed: Vec<SocketAddr>,
    /// Requests sent, over all addresses
    pub attempts: u32,
}

/// Dispatches actions to the worker fleet
pub struct Manager {
    workers: Vec<String>,
    worker_port: u16,
    retries: u32,
    client: reqwest::Client,
    resolver: Arc<dyn AddressResolver>,
}

impl Manager {
    pub fn new(config: &SwarmConfig) -> Result<Self> {
        Ok(Self {
            workers: config.workers.clone(),
            worker_port: config.worker_port,
            retries: config.retries,
            client: config.http_client()?,
            resolver: Arc::new(DnsResolver),
        })
    }

    /// Replace the hostname resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    /// Send an action to every worker address
    ///
    /// Each distinct address is attempted once per call, with retries, even
    /// when several hostnames resolve to it. Failures never propagate.
    pub async fn send_action(&self, action: &str, args: &[String]) -> DispatchReport {
        let mut report = DispatchReport::default();

        let body = match ActionRequest::new(action, args).to_bytes() {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode {} action: {}", action, e);
                return report;
            }
        };

        if self.workers.is_empty() {
            debug!("No workers configured for {} action", action);
            return report;
        }

        let what = format!("{} action ({})", action, args.join(" "));
        let mut attempted: HashSet<SocketAddr> = HashSet::new();

        for worker in &self.workers {
            let addresses = match self.resolver.resolve(worker, self.worker_port).await {
                Ok(addresses) => addresses,
                Err(e) => {
                    error!("Failed to resolve worker {}: {}", worker, e);
                    continue;
                }
            };

            if addresses.is_empty() {
                warn!("Worker {} resolved to no addresses", worker);
            }

            for address in addresses {
                if !attempted.insert(address) {
                    debug!("Skipping {} for {}, already attempted", address, worker);
                    continue;
                }

                let url = format!("http://{}/", address);
                let delivery =
                    deliver(&self.client, &url, body.clone(), self.retries, &what).await;

                report.attempts += delivery.attempts;
                if delivery.delivered {
                    report.delivered.push(address);
                } else {
                    report.failed.push(address);
                }
            }
        }

        report
    }
}

/// Reconciliation entry point triggered by worker notifications
#[async_trait]
pub trait UpdateTrigger: Send + Sync {
    async fn trigger_update(&self) -> Result<()>;
}

/// Inbound manager endpoint: any POST triggers an update
pub struct UpdateEndpoint {
    trigger: Arc<dyn UpdateTrigger>,
}

impl UpdateEndpoint {
    pub fn new(trigger: Arc<dyn UpdateTrigger>) -> Self {
        Self { trigger }
    }
}

#[async_trait]
impl RequestHandler for UpdateEndpoint {
    async fn handle(&self, _request: HttpRequest) -> HttpResponse {
        debug!("Update requested through the manager endpoint");

        match self.trigger.trigger_update().await {
            Ok(()) => HttpResponse::ok(),
            Err(e) => {
                error!("Update failed: {}", e);
                HttpResponse::error(500, &e.to_string())
            }
        }
    }
}

/// Resolver with a fixed table, for setups without DNS
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: Vec<(String, Vec<SocketAddr>)>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addresses: Vec<SocketAddr>) -> Self {
        self.entries.push((host.to_string(), addresses));
        self
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<SocketAddr>> {
        self.entries
            .iter()
            .find(|(name, _)| name == host)
            .map(|(_, addresses)| addresses.clone())
            .ok_or_else(|| PygenError::Dispatch(format!("Unknown host {}", host)))
    }
}
