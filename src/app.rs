//! The reconciling application
//!
//! `PyGen` regenerates the target from a fresh runtime snapshot whenever it is
//! triggered, writes it when the content changed and then schedules the
//! configured restart and signal actions.

use crate::actions::{Action, ActionExecutor};
use crate::config::AppConfig;
use crate::error::{PygenError, Result};
use crate::notify::{NotificationCallback, NotificationTimer};
use crate::runtime::{EventFilter, RuntimeClient, RuntimeEvent};
use crate::state::State;
use crate::swarm::{HttpServer, Manager, UpdateEndpoint, UpdateTrigger};
use crate::template::Renderer;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Runs the configured actions when a notification fires
pub struct ActionNotifier {
    executor: Arc<ActionExecutor>,
    restart: Vec<String>,
    signal: Vec<(String, String)>,
}

impl ActionNotifier {
    pub fn new(
        executor: Arc<ActionExecutor>,
        restart: Vec<String>,
        signal: Vec<(String, String)>,
    ) -> Self {
        Self {
            executor,
            restart,
            signal,
        }
    }
}

#[async_trait]
impl NotificationCallback for ActionNotifier {
    async fn notify(&self) {
        for target in &self.restart {
            let args = [target.clone()];
            if let Err(e) = self.executor.execute(Action::Restart.name(), &args).await {
                error!("Failed to restart {}: {}", target, e);
            }
        }

        for (target, signal) in &self.signal {
            let args = [target.clone(), signal.clone()];
            if let Err(e) = self.executor.execute(Action::Signal.name(), &args).await {
                error!("Failed to signal {} with {}: {}", target, signal, e);
            }
        }
    }
}

/// Template generator driven by runtime state
pub struct PyGen {
    runtime: Arc<dyn RuntimeClient>,
    renderer: Arc<dyn Renderer>,
    target: Option<PathBuf>,
    events: EventFilter,
    swarm_manager: bool,
    manager_port: u16,
    timer: NotificationTimer,
    /// Serializes reconciliation; holds the last content written to stdout
    reconcile: Mutex<Option<String>>,
}

impl PyGen {
    pub fn new(
        config: AppConfig,
        runtime: Arc<dyn RuntimeClient>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        config.validate()?;

        let mut executor = ActionExecutor::new(Arc::clone(&runtime));
        if config.dispatches_to_workers() {
            let manager = Manager::new(&config.swarm)?;
            info!("Dispatching worker actions to {}", manager.workers().join(", "));
            executor = executor.with_manager(Arc::new(manager));
        }

        let notifier = ActionNotifier::new(Arc::new(executor), config.restart, config.signal);
        let timer = NotificationTimer::new(
            config.interval.min,
            config.interval.max,
            Arc::new(notifier),
        );

        Ok(Self {
            runtime,
            renderer,
            target: config.target,
            events: config.events,
            swarm_manager: config.swarm_manager,
            manager_port: config.swarm.manager_port,
            timer,
            reconcile: Mutex::new(None),
        })
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Render the template against a fresh snapshot
    pub async fn generate(&self) -> Result<String> {
        let state = State::capture(self.runtime.as_ref()).await?;
        self.renderer.render(&state)
    }

    /// Regenerate and write the target if its content changed
    ///
    /// Returns whether the target was written. A changed target schedules a
    /// notification; an unchanged one does not.
    pub async fn update_target(&self) -> Result<bool> {
        let changed = {
            let mut last = self.reconcile.lock().await;
            let content = self.generate().await?;

            match &self.target {
                Some(path) => {
                    let existing = match tokio::fs::read_to_string(path).await {
                        Ok(existing) => Some(existing),
                        Err(e) if e.kind() == ErrorKind::NotFound => None,
                        Err(e) => return Err(e.into()),
                    };

                    if existing.as_deref() == Some(content.as_str()) {
                        false
                    } else {
                        write_atomically(path, &content).await?;
                        info!("Target updated at {}", path.display());
                        true
                    }
                }
                None => {
                    if last.as_deref() == Some(content.as_str()) {
                        false
                    } else {
                        let mut stdout = tokio::io::stdout();
                        stdout.write_all(content.as_bytes()).await?;
                        stdout.flush().await?;
                        *last = Some(content);
                        true
                    }
                }
            }
        };

        if changed {
            self.timer.schedule().await;
        } else {
            debug!("Target is unchanged");
        }

        Ok(changed)
    }

    /// Update the target on every watched runtime event
    ///
    /// Returns an error once the event stream ends.
    pub async fn watch(&self) -> Result<()> {
        let events = self.runtime.events().await?;
        info!("Starting event watch loop");
        self.process_events(events).await
    }

    pub(crate) async fn process_events(&self, mut events: mpsc::Receiver<RuntimeEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            if !self.events.matches(&event) {
                continue;
            }

            debug!("Event {} on {}", event.status, event.actor_id);
            if let Err(e) = self.update_target().await {
                error!("Failed to update target after {} event: {}", event.status, e);
            }
        }

        Err(PygenError::Runtime("Event stream ended".to_string()))
    }

    /// Start the manager update endpoint when manager mode is enabled
    pub async fn serve_manager(self: &Arc<Self>) -> Result<Option<HttpServer>> {
        if !self.swarm_manager {
            return Ok(None);
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.manager_port));
        self.serve_manager_on(addr).await.map(Some)
    }

    pub async fn serve_manager_on(self: &Arc<Self>, addr: SocketAddr) -> Result<HttpServer> {
        let trigger: Arc<dyn UpdateTrigger> = Arc::clone(self) as Arc<dyn UpdateTrigger>;
        HttpServer::bind(addr, Arc::new(UpdateEndpoint::new(trigger))).await
    }

    /// Drop any pending notification
    pub fn stop(&self) {
        self.timer.cancel();
        info!("Stopped");
    }
}

#[async_trait]
impl UpdateTrigger for PyGen {
    async fn trigger_update(&self) -> Result<()> {
        self.update_target().await.map(|_| ())
    }
}

/// Write through a temporary sibling and rename over the target
async fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    let temporary = path.with_file_name(format!(".{}.pygen-tmp", file_name));

    tokio::fs::write(&temporary, content).await?;
    if let Err(e) = tokio::fs::rename(&temporary, path).await {
        let _ = tokio::fs::remove_file(&temporary).await;
        return Err(e.into());
    }
    Ok(())
}
