//! Sandbox limits

use ede_synthesis::ALLOWED_MODULES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Limits and interpreter for running synthesized code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Python interpreter
    pub interpreter: PathBuf,
    /// Wall-clock limit per execution, in seconds
    pub timeout_secs: u64,
    /// Address-space cap for the interpreter, in MiB; `None` disables it
    pub memory_limit_mb: Option<u64>,
    /// Top-level modules the code may import
    pub allowed_modules: Vec<String>,
    /// Largest output read from each interpreter stream, in bytes; the
    /// interpreter is killed once it writes more
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            timeout_secs: 60,
            memory_limit_mb: Some(2048),
            allowed_modules: ALLOWED_MODULES.iter().map(ToString::to_string).collect(),
            max_output_bytes: 32 * 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Wall-clock limit
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Memory cap in bytes
    #[must_use]
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Set timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set interpreter
    #[inline]
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}
