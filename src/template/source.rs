//! Template source resolution

use crate::error::{PygenError, Result};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const URL_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the template text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Text given on the command line after a leading `#`
    Inline(String),
    /// Fetched over HTTP(S)
    Url(String),
    /// Read from disk
    File(PathBuf),
}

impl TemplateSource {
    pub fn parse(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(PygenError::Config("No template is defined".to_string()));
        }

        if let Some(inline) = source.strip_prefix('#') {
            return Ok(Self::Inline(inline.trim().to_string()));
        }

        let url = Regex::new(r"^https?://[^.]+\..+").map_err(|e| PygenError::Template(e.to_string()))?;
        if url.is_match(source) {
            return Ok(Self::Url(source.to_string()));
        }

        Ok(Self::File(PathBuf::from(source)))
    }

    /// Read the template text
    pub async fn load(&self, no_ssl_check: bool) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::Url(url) => {
                debug!("Downloading template from {}", url);

                let client = reqwest::Client::builder()
                    .timeout(URL_TIMEOUT)
                    .danger_accept_invalid_certs(no_ssl_check)
                    .build()
                    .map_err(|e| PygenError::Template(e.to_string()))?;

                let response = client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(PygenError::Config(format!(
                        "Failed to download template from {}: {}",
                        url,
                        response.status()
                    )));
                }

                Ok(response.text().await?)
            }
            Self::File(path) => {
                if !path.is_file() {
                    return Err(PygenError::Config(format!(
                        "Template file not found: {}",
                        path.display()
                    )));
                }

                debug!("Reading template from {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
        }
    }
}
