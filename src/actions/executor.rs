//! Action execution

use super::{Action, ExecutionStrategy};
use crate::error::Result;
use crate::runtime::{RuntimeClient, DEFAULT_DESIRED_TASK_STATE};
use crate::swarm::Manager;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs actions against the local runtime and, when a manager is attached,
/// the worker fleet
pub struct ActionExecutor {
    runtime: Arc<dyn RuntimeClient>,
    manager: Option<Arc<Manager>>,
}

impl ActionExecutor {
    /// Executor for a standalone node or a worker
    pub fn new(runtime: Arc<dyn RuntimeClient>) -> Self {
        Self {
            runtime,
            manager: None,
        }
    }

    /// Dispatch worker-bound actions through `manager`
    pub fn with_manager(mut self, manager: Arc<Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Execute the action registered as `name`
    ///
    /// Only an unknown name or malformed arguments are errors. Failures on
    /// individual resources or workers are logged and skipped.
    pub async fn execute(&self, name: &str, args: &[String]) -> Result<()> {
        let action = Action::from_name(name)?;
        action.validate(args)?;

        let strategy = action.strategy();
        debug!("Executing {} action ({}) with {:?}", action, strategy, args);

        let run_here = match &self.manager {
            Some(manager) => {
                if strategy.contains(ExecutionStrategy::WORKER) {
                    debug!("Executing {} action on workers", action);
                    manager.send_action(action.name(), args).await;
                }
                strategy.contains(ExecutionStrategy::MANAGER)
                    || strategy.contains(ExecutionStrategy::LOCAL)
            }
            None => true,
        };

        if run_here {
            self.process(action, args).await;
        }

        Ok(())
    }

    async fn process(&self, action: Action, args: &[String]) {
        match action {
            Action::Restart => self.restart(&args[0]).await,
            Action::Signal => self.signal(&args[0], &args[1]).await,
        }
    }

    async fn restart(&self, target: &str) {
        let services = match self.runtime.services(DEFAULT_DESIRED_TASK_STATE).await {
            Ok(services) => services.matching(target),
            Err(e) => {
                debug!("Services unavailable for restart of {}: {}", target, e);
                Default::default()
            }
        };

        if !services.is_empty() {
            for service in &services {
                match self.runtime.force_update_service(&service.id).await {
                    Ok(()) => info!("Service {} restarted for target {}", service.name, target),
                    Err(e) => error!(
                        "Failed to restart service {} for target {}: {}",
                        service.name, target, e
                    ),
                }
            }
            return;
        }

        if let Some(manager) = &self.manager {
            info!("Sending restart event to workers for {}", target);
            manager
                .send_action(Action::Restart.name(), &[target.to_string()])
                .await;
            return;
        }

        let containers = match self.runtime.containers().await {
            Ok(containers) => containers.matching(target),
            Err(e) => {
                error!("Failed to list containers to restart {}: {}", target, e);
                return;
            }
        };

        let (mut restarted, mut failed) = (0, 0);
        for container in &containers {
            match self.runtime.restart_container(&container.id).await {
                Ok(()) => {
                    restarted += 1;
                    info!("Container {} restarted for target {}", container.name, target);
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        "Failed to restart container {} for target {}: {}",
                        container.name, target, e
                    );
                }
            }
        }

        debug!(
            "Restart of {}: {} restarted, {} failed",
            target, restarted, failed
        );
    }

    async fn signal(&self, target: &str, signal: &str) {
        match self.runtime.services(DEFAULT_DESIRED_TASK_STATE).await {
            Ok(services) => {
                for service in &services.matching(target) {
                    warn!(
                        "Signals can not be sent to services, skipping {} for target {}",
                        service.name, target
                    );
                }
            }
            Err(e) => debug!("Services unavailable for signal to {}: {}", target, e),
        }

        let containers = match self.runtime.containers().await {
            Ok(containers) => containers.matching(target),
            Err(e) => {
                error!("Failed to list containers to signal {}: {}", target, e);
                return;
            }
        };

        let (mut signalled, mut failed) = (0, 0);
        for container in &containers {
            match self.runtime.kill_container(&container.id, signal).await {
                Ok(()) => {
                    signalled += 1;
                    info!(
                        "Signal {} sent to container {} for target {}",
                        signal, container.name, target
                    );
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        "Failed to signal container {} with {} for target {}: {}",
                        container.name, signal, target, e
                    );
                }
            }
        }

        debug!(
            "Signal {} to {}: {} signalled, {} failed",
            signal, target, signalled, failed
        );
    }
}
