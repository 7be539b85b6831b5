//! Host settings for running jobs.
//!
//! Loaded from a JSON file; missing keys fall back to the defaults below.
//! `ESA_LAUNCHER` overrides the launcher command.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{EsaError, EsaResult};

/// Environment variable overriding [`Settings::launcher_command`]
pub const LAUNCHER_ENV: &str = "ESA_LAUNCHER";

/// How a host submits and waits for jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Batch launcher executable
    pub launcher_command: String,

    /// Arguments placed before the configuration file name
    pub launcher_args: Vec<String>,

    /// Delay between checks for the job's out file
    pub poll_interval_ms: u64,

    /// Give up waiting after this long
    pub timeout_secs: u64,

    /// Recorded in working directory locks
    pub user_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            launcher_command: "bsub.isami".to_string(),
            launcher_args: Vec::new(),
            poll_interval_ms: 1000,
            timeout_secs: 6 * 60 * 60,
            user_id: "esa".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> EsaResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EsaError::file_error("read", path.display().to_string(), e.to_string()))?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|e| EsaError::SerializationError {
                reason: format!("Invalid settings in {}: {}", path.display(), e),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(command) = lookup(LAUNCHER_ENV).filter(|c| !c.trim().is_empty()) {
            self.launcher_command = command;
        }
        self
    }

    pub fn validate(&self) -> EsaResult<()> {
        if self.launcher_command.trim().is_empty() {
            return Err(EsaError::missing_field("launcher_command"));
        }
        if self.poll_interval_ms == 0 {
            return Err(EsaError::invalid_input(
                "poll_interval_ms",
                "0",
                "Poll interval must be positive",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
