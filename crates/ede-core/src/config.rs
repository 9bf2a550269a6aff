//! Session configuration
//!
//! Loaded from TOML; secrets and endpoints can be overridden through the
//! environment:
//!
//! | Variable              | Field             |
//! |-----------------------|-------------------|
//! | `EDE_ORACLE_API_KEY`  | `oracle.api_key`  |
//! | `EDE_ORACLE_ENDPOINT` | `oracle.endpoint` |
//! | `EDE_ORACLE_MODEL`    | `oracle.model`    |

use crate::error::{ConfigError, ConfigResult};
use ede_eventlog::{CoverageThreshold, DEFAULT_COVERAGE};
use ede_report::ReportSettings;
use ede_sandbox::SandboxConfig;
use ede_synthesis::{
    default_excluded_labels, OracleConfig, StalenessPolicy, DEFAULT_SYNTHESIS_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the oracle API key
pub const ENV_API_KEY: &str = "EDE_ORACLE_API_KEY";
/// Environment variable overriding the oracle endpoint
pub const ENV_ENDPOINT: &str = "EDE_ORACLE_ENDPOINT";
/// Environment variable overriding the oracle model
pub const ENV_MODEL: &str = "EDE_ORACLE_MODEL";

/// EDE configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdeConfig {
    /// Oracle connection
    pub oracle: OracleConfig,
    /// Sandbox limits
    pub sandbox: SandboxConfig,
    /// Synthesis cache keying
    pub staleness: StalenessPolicy,
    /// Oracle timeout for code synthesis, in seconds
    pub synthesis_timeout_secs: u64,
    /// Coverage threshold used when none is given
    pub coverage: f64,
    /// Analyses the oracle should not propose again
    pub excluded_labels: Vec<String>,
    /// Report layout
    pub report: ReportSettings,
}

impl Default for EdeConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            sandbox: SandboxConfig::default(),
            staleness: StalenessPolicy::default(),
            synthesis_timeout_secs: DEFAULT_SYNTHESIS_TIMEOUT.as_secs(),
            coverage: DEFAULT_COVERAGE,
            excluded_labels: default_excluded_labels(),
            report: ReportSettings::default(),
        }
    }
}

impl EdeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file and apply environment overrides.
    ///
    /// # Errors
    /// [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let config = config.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `EDE_ORACLE_*` overrides read through `lookup`
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| lookup(name).filter(|v: &String| !v.trim().is_empty());
        if let Some(key) = set(ENV_API_KEY) {
            self.oracle.api_key = Some(key);
        }
        if let Some(endpoint) = set(ENV_ENDPOINT) {
            self.oracle.endpoint = endpoint;
        }
        if let Some(model) = set(ENV_MODEL) {
            self.oracle.model = model;
        }
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for an out-of-range coverage or zero timeouts.
    pub fn validate(&self) -> ConfigResult<()> {
        CoverageThreshold::new(self.coverage)
            .map_err(|e| ConfigError::Invalid(format!("coverage: {e}")))?;
        if self.synthesis_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "synthesis_timeout_secs must be positive".to_string(),
            ));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Synthesis timeout
    #[inline]
    #[must_use]
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    /// With oracle settings
    #[inline]
    #[must_use]
    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// With sandbox limits
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// With synthesis staleness policy
    #[inline]
    #[must_use]
    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    /// With default coverage threshold
    #[inline]
    #[must_use]
    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = coverage;
        self
    }

    /// With excluded analysis labels
    #[inline]
    #[must_use]
    pub fn with_excluded_labels(mut self, labels: Vec<String>) -> Self {
        self.excluded_labels = labels;
        self
    }

    /// With report layout
    #[inline]
    #[must_use]
    pub fn with_report(mut self, report: ReportSettings) -> Self {
        self.report = report;
        self
    }
}
