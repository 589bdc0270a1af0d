//! Manager/worker wire format

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Body of a successful response
pub const ACKNOWLEDGEMENT: &str = "OK\n";

/// Action invocation sent from the manager to a worker
///
/// `{"action": "signal", "args": ["web", "HUP"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ActionRequest {
    pub fn new(action: &str, args: &[String]) -> Self {
        Self {
            action: action.to_string(),
            args: args.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}
