//! pygen - template generator driven by Docker runtime state
//!
//! This is the main CLI entry point for pygen.

use anyhow::{Context, Result};
use clap::Parser;
use pygen::app::PyGen;
use pygen::config::{AppConfig, Interval, SwarmConfig};
use pygen::runtime::{DockerClient, EventFilter, RuntimeClient};
use pygen::template::load_renderer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// pygen - generate files from Docker runtime state
#[derive(Parser)]
#[command(name = "pygen")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Template generator for Docker containers and swarm services", long_about = None)]
struct Cli {
    /// Template: a file path, an http(s) URL, or inline text after a leading '#'
    #[arg(long)]
    template: String,

    /// Target file, stdout when omitted
    #[arg(long)]
    target: Option<PathBuf>,

    /// Restart containers or services matching the target when the file changes
    #[arg(long, value_name = "TARGET")]
    restart: Vec<String>,

    /// Send a signal to containers matching the target when the file changes
    #[arg(long, num_args = 2, value_names = ["TARGET", "SIGNAL"])]
    signal: Vec<String>,

    /// Minimum and maximum seconds between notifications
    #[arg(long, num_args = 1..=2, value_name = "SECONDS", allow_negative_numbers = true)]
    interval: Vec<f64>,

    /// Accept update notifications from workers
    #[arg(long)]
    swarm_manager: bool,

    /// Worker hostnames to dispatch actions to
    #[arg(long, num_args = 1.., value_name = "HOSTNAME")]
    workers: Vec<String>,

    /// Retries per worker address
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Event statuses that trigger an update
    #[arg(long, num_args = 1.., value_name = "EVENT")]
    events: Vec<String>,

    /// Skip TLS verification when downloading the template
    #[arg(long)]
    no_ssl_check: bool,

    /// Docker endpoint, DOCKER_HOST when omitted
    #[arg(long)]
    docker_host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig> {
        let interval = Interval::from_secs(&self.interval).context("Invalid --interval")?;

        let signal = self
            .signal
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair.get(1).cloned().unwrap_or_default()))
            .collect();

        let events = if self.events.is_empty() {
            EventFilter::default()
        } else {
            EventFilter::new(self.events)
        };

        Ok(AppConfig {
            template: self.template,
            target: self.target,
            restart: self.restart,
            signal,
            interval,
            swarm_manager: self.swarm_manager,
            swarm: SwarmConfig {
                workers: self.workers,
                retries: self.retries,
                ..Default::default()
            },
            events,
            no_ssl_check: self.no_ssl_check,
            docker_host: self.docker_host,
        })
    }
}

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli.into_config()?;
    config.validate().context("Invalid configuration")?;

    let runtime: Arc<dyn RuntimeClient> = Arc::new(
        match &config.docker_host {
            Some(host) => DockerClient::new(host),
            None => DockerClient::from_env(),
        }
        .context("Failed to create Docker client")?,
    );

    let renderer = load_renderer(&config.template, config.no_ssl_check)
        .await
        .context("Failed to load template")?;

    info!("Watching events: {}", config.events.names().join(", "));

    let app = Arc::new(PyGen::new(config, runtime, Arc::new(renderer))?);
    let server = app
        .serve_manager()
        .await
        .context("Failed to start manager endpoint")?;
    if let Some(server) = &server {
        info!("Manager endpoint listening on {}", server.local_addr());
    }

    app.update_target()
        .await
        .context("Failed to generate the initial target")?;

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let mut watcher = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.watch().await }
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
                info!("Received SIGHUP, updating target");
                if let Err(e) = app.update_target().await {
                    error!("Failed to update target: {}", e);
                }
            }
            _ = interrupt.recv() => break Ok(()),
            _ = terminate.recv() => break Ok(()),
        }
    };

    info!("Shutting down");
    watcher.abort();
    if let Some(server) = server {
        server.shutdown();
    }
    app.stop();

    outcome
}
