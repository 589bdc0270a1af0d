//! Runtime configuration
//!
//! Plain settings structs built by the binaries from their command lines.

use crate::error::{PygenError, Result};
use crate::runtime::EventFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Control port the manager listens on for update notifications
pub const DEFAULT_MANAGER_PORT: u16 = 9411;
/// Action port workers listen on
pub const DEFAULT_WORKER_PORT: u16 = 9412;

pub const DEFAULT_MIN_INTERVAL: f64 = 0.5;
pub const DEFAULT_MAX_INTERVAL: f64 = 2.0;

/// Notification debounce bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Quiet period before a notification fires
    pub min: Duration,
    /// Upper bound between the first change and its notification
    pub max: Duration,
}

impl Interval {
    /// Build from `--interval` values in seconds
    ///
    /// A single value is used for both bounds. Values at or below zero switch
    /// debouncing off.
    pub fn from_secs(values: &[f64]) -> Result<Self> {
        let (min, max) = match values {
            [] => (DEFAULT_MIN_INTERVAL, DEFAULT_MAX_INTERVAL),
            [value] => (*value, *value),
            [min, max] => (*min, *max),
            _ => {
                return Err(PygenError::Config(format!(
                    "Interval takes one or two values, got {}",
                    values.len()
                )))
            }
        };

        if !min.is_finite() || !max.is_finite() {
            return Err(PygenError::Config(format!(
                "Interval bounds must be finite: {} {}",
                min, max
            )));
        }
        if min > max {
            return Err(PygenError::Config(format!(
                "Minimum interval {} is greater than maximum interval {}",
                min, max
            )));
        }

        Ok(Self {
            min: seconds(min)?,
            max: seconds(max)?,
        })
    }

    pub fn is_immediate(&self) -> bool {
        self.min.is_zero() || self.max.is_zero()
    }
}

/// Negative values clamp to zero; values beyond `Duration` range are rejected
fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value.max(0.0))
        .map_err(|e| PygenError::Config(format!("Invalid interval {}: {}", value, e)))
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            min: Duration::from_secs_f64(DEFAULT_MIN_INTERVAL),
            max: Duration::from_secs_f64(DEFAULT_MAX_INTERVAL),
        }
    }
}

/// Manager/worker dispatch settings
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Worker hostnames, each may resolve to several addresses
    pub workers: Vec<String>,
    pub worker_port: u16,
    pub manager_port: u16,
    /// Extra attempts per address after the first one fails
    pub retries: u32,
    pub connect_timeout: Duration,
    /// Total time budget of a single attempt
    pub request_timeout: Duration,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            worker_port: DEFAULT_WORKER_PORT,
            manager_port: DEFAULT_MANAGER_PORT,
            retries: 0,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SwarmConfig {
    /// HTTP client for dispatch requests with the configured timeouts
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| PygenError::Dispatch(e.to_string()))
    }
}

/// Settings of the reconciling application
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Template source: inline (`#...`), URL or file path
    pub template: String,
    /// Output file, stdout when unset
    pub target: Option<PathBuf>,
    /// Targets restarted on notification
    pub restart: Vec<String>,
    /// `(target, signal)` pairs sent on notification
    pub signal: Vec<(String, String)>,
    pub interval: Interval,
    /// Serve the manager update endpoint
    pub swarm_manager: bool,
    pub swarm: SwarmConfig,
    pub events: EventFilter,
    /// Skip TLS verification for remote templates
    pub no_ssl_check: bool,
    /// Docker endpoint, `DOCKER_HOST` when unset
    pub docker_host: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            template: String::new(),
            target: None,
            restart: Vec::new(),
            signal: Vec::new(),
            interval: Interval::default(),
            swarm_manager: false,
            swarm: SwarmConfig::default(),
            events: EventFilter::default(),
            no_ssl_check: false,
            docker_host: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.template.trim().is_empty() {
            return Err(PygenError::Config("No template is defined".to_string()));
        }
        if self.restart.iter().any(|target| target.is_empty()) {
            return Err(PygenError::Config("Restart target must not be empty".to_string()));
        }
        if self
            .signal
            .iter()
            .any(|(target, signal)| target.is_empty() || signal.is_empty())
        {
            return Err(PygenError::Config(
                "Signal needs a target and a signal name".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether actions are dispatched to workers
    pub fn dispatches_to_workers(&self) -> bool {
        !self.swarm.workers.is_empty()
    }
}

/// Settings of the worker process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Manager hostname
    pub manager: String,
    pub swarm: SwarmConfig,
    pub events: EventFilter,
    pub docker_host: Option<String>,
}

impl WorkerConfig {
    pub fn new(manager: &str) -> Self {
        Self {
            manager: manager.to_string(),
            swarm: SwarmConfig::default(),
            events: EventFilter::default(),
            docker_host: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.manager.trim().is_empty() {
            return Err(PygenError::Config("Manager hostname is required".to_string()));
        }
        Ok(())
    }
}
