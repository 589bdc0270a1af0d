//! pygen - template generation driven by Docker and Docker Swarm state
//!
//! pygen renders a target file from a live snapshot of the container runtime
//! and keeps it current as runtime events arrive. When the target changes it
//! runs the configured actions, debounced:
//!
//! - Restarting containers or force-updating swarm services
//! - Sending signals to containers
//! - Fanning actions out to worker processes on other swarm nodes

pub mod actions;
pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod runtime;
pub mod state;
pub mod swarm;
pub mod template;

pub use error::{PygenError, Result};
