//! Actions applied to matched runtime resources
//!
//! Actions are a closed set looked up by name. Each one declares where it has
//! to run ([`ExecutionStrategy`]); the [`ActionExecutor`] combines that with
//! the process topology to decide between local execution and dispatch to
//! the worker fleet.

pub mod executor;
pub mod strategy;

pub use executor::ActionExecutor;
pub use strategy::ExecutionStrategy;

use crate::error::{PygenError, Result};
use std::fmt;

/// Registered actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Force-update matching services, or restart matching containers
    Restart,
    /// Send a signal to matching containers
    Signal,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Restart, Action::Signal];

    /// Look up an action by its wire name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.name() == name)
            .ok_or_else(|| PygenError::UnknownAction(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Restart => "restart",
            Action::Signal => "signal",
        }
    }

    pub fn strategy(self) -> ExecutionStrategy {
        match self {
            Action::Restart => ExecutionStrategy::MANAGER,
            Action::Signal => ExecutionStrategy::WORKER,
        }
    }

    /// Positional arguments: `restart <target>`, `signal <target> <signal>`
    pub fn validate(self, args: &[String]) -> Result<()> {
        let expected = match self {
            Action::Restart => 1,
            Action::Signal => 2,
        };

        if args.len() != expected {
            return Err(PygenError::InvalidArguments {
                action: self.name().to_string(),
                message: format!("expected {} arguments, got {}", expected, args.len()),
            });
        }

        if args.iter().any(|arg| arg.is_empty()) {
            return Err(PygenError::InvalidArguments {
                action: self.name().to_string(),
                message: "arguments must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
