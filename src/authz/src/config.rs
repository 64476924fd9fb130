//! Engine configuration loading and validation

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Authorization engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Enable metrics collection
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Deadline for one fact-gathering read
    #[serde(default = "default_fact_timeout_ms")]
    pub fact_timeout_ms: u64,

    /// Max concurrent per-row fact fetches while listing
    #[serde(default = "default_list_concurrency")]
    pub list_concurrency: usize,

    /// Background jobs allowed on the elevated path
    #[serde(default)]
    pub elevated_jobs: BTreeSet<String>,

    /// PostgreSQL connection string for the database-backed fact store
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_true() -> bool { true }
fn default_fact_timeout_ms() -> u64 { 2_000 }
fn default_list_concurrency() -> usize { 16 }
fn default_max_connections() -> u32 { 5 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            fact_timeout_ms: default_fact_timeout_ms(),
            list_concurrency: default_list_concurrency(),
            elevated_jobs: BTreeSet::new(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)
            .map_err(|e| AuthzError::Configuration(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fact_timeout_ms == 0 {
            return Err(AuthzError::Configuration(
                "fact_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.list_concurrency == 0 {
            return Err(AuthzError::Configuration(
                "list_concurrency must be at least 1".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(AuthzError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if let Some(job) = self.elevated_jobs.iter().find(|job| job.trim().is_empty()) {
            return Err(AuthzError::Configuration(format!(
                "invalid elevated job name '{}'",
                job
            )));
        }

        Ok(())
    }

    pub fn fact_timeout(&self) -> Duration {
        Duration::from_millis(self.fact_timeout_ms)
    }

    pub fn allows_elevated(&self, job: &str) -> bool {
        self.elevated_jobs.contains(job)
    }

    /// Allow-list a background job for elevated evaluation
    pub fn with_elevated_job(mut self, job: impl Into<String>) -> Self {
        self.elevated_jobs.insert(job.into());
        self
    }
}
