//! Runtime configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for an [`ExecutionContext`](crate::ExecutionContext).
///
/// Every field has a default, so a configuration document only needs to name
/// what it changes:
///
/// ```rust
/// use chr_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json_str(r#"{ "step_limit": 10000 }"#).unwrap();
/// assert_eq!(config.step_limit, Some(10000));
/// assert!(!config.trace);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Abort a run after this many continuation steps.
    pub step_limit: Option<u64>,

    /// Report lifecycle events through `tracing`.
    pub trace: bool,

    /// Initial value of the queuing request flag.
    pub start_queuing: bool,
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}
