//! Where an action's effect is applied

use std::fmt;
use std::ops::BitOr;

/// Set of execution locations for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionStrategy(u8);

impl ExecutionStrategy {
    /// Run in the current process against its own runtime
    pub const LOCAL: Self = Self(1);
    /// Forward to the worker fleet through the manager dispatcher
    pub const WORKER: Self = Self(2);
    /// Run against the swarm manager API
    pub const MANAGER: Self = Self(4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::LOCAL | Self::WORKER
    }
}

impl BitOr for ExecutionStrategy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::LOCAL, "local"),
            (Self::WORKER, "worker"),
            (Self::MANAGER, "manager"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let strategy = ExecutionStrategy::LOCAL | ExecutionStrategy::WORKER;
        assert!(strategy.contains(ExecutionStrategy::LOCAL));
        assert!(strategy.contains(ExecutionStrategy::WORKER));
        assert!(!strategy.contains(ExecutionStrategy::MANAGER));
        assert!(!strategy.contains(ExecutionStrategy::empty()));
        assert_eq!(strategy, ExecutionStrategy::default());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExecutionStrategy::default().to_string(), "local|worker");
        assert_eq!(ExecutionStrategy::MANAGER.to_string(), "manager");
        assert_eq!(ExecutionStrategy::empty().to_string(), "none");
    }
}
