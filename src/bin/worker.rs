//! pygen-worker - executes dispatched actions on a swarm node
//!
//! Serves the action endpoint for the manager and notifies the manager when
//! local container events arrive.

use anyhow::{Context, Result};
use clap::Parser;
use pygen::config::{SwarmConfig, WorkerConfig};
use pygen::runtime::{DockerClient, EventFilter, RuntimeClient};
use pygen::swarm::Worker;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// pygen worker
#[derive(Parser)]
#[command(name = "pygen-worker")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Runs pygen actions dispatched by the manager", long_about = None)]
struct Cli {
    /// Manager hostname
    #[arg(long)]
    manager: String,

    /// Event statuses that notify the manager
    #[arg(long, num_args = 1.., value_name = "EVENT")]
    events: Vec<String>,

    /// Retries when notifying the manager
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Docker endpoint, DOCKER_HOST when omitted
    #[arg(long)]
    docker_host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = WorkerConfig {
        manager: cli.manager,
        swarm: SwarmConfig {
            retries: cli.retries,
            ..Default::default()
        },
        events: if cli.events.is_empty() {
            EventFilter::default()
        } else {
            EventFilter::new(cli.events)
        },
        docker_host: cli.docker_host,
    };

    let runtime: Arc<dyn RuntimeClient> = Arc::new(
        match &config.docker_host {
            Some(host) => DockerClient::new(host),
            None => DockerClient::from_env(),
        }
        .context("Failed to create Docker client")?,
    );

    let worker = Arc::new(Worker::new(&config, runtime).context("Invalid configuration")?);
    let server = worker.serve().await.context("Failed to start action endpoint")?;
    info!(
        "Worker listening on {}, manager at {}",
        server.local_addr(),
        worker.manager_url()
    );

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let mut watcher = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.watch_events().await }
    });

    let outcome = loop {
        tokio::select! {
            result = &mut watcher => {
                break match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(anyhow::Error::new(e).context("Event watch failed")),
                    Err(e) => Err(anyhow::Error::new(e).context("Event watch aborted")),
                };
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, notifying manager");
                worker.send_update().await;
            }
            _ = interrupt.recv() => break Ok(()),
            _ = terminate.recv() => break Ok(()),
        }
    };

    info!("Shutting down");
    watcher.abort();
    server.shutdown();

    outcome
}
