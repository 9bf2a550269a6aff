//! Error types for sandboxed execution

use std::path::PathBuf;
use std::time::Duration;

/// Why one execution of synthesized code failed
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Code text does not compile
    #[error("compile error: {0}")]
    CompileError(String),

    /// Entry point missing or wrong return shape
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Exception raised while running the code, including denied imports and
    /// exhausted memory
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Wall-clock limit hit; the interpreter was killed
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// Interpreter could not be started
    #[error("failed to start interpreter {interpreter}: {source}")]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Working directory could not be prepared
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness output could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SandboxError {
    /// Create spawn error for interpreter
    pub fn spawn(interpreter: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            interpreter: interpreter.into(),
            source,
        }
    }

    /// True when the synthesized code is at fault rather than the host
    #[must_use]
    pub fn is_code_fault(&self) -> bool {
        matches!(
            self,
            Self::CompileError(_)
                | Self::ContractViolation(_)
                | Self::ExecutionError(_)
                | Self::Timeout(_)
        )
    }

    /// Short machine-readable kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CompileError(_) => "compile_error",
            Self::ContractViolation(_) => "contract_violation",
            Self::ExecutionError(_) => "execution_error",
            Self::Timeout(_) => "timeout",
            Self::Spawn { .. } => "spawn",
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// A failed execution together with the code that failed, for inspection
#[derive(Debug, thiserror::Error)]
#[error("'{suggestion}' failed: {error}")]
pub struct ExecutionFailure {
    /// Suggestion being executed
    pub suggestion: String,
    /// Offending source
    pub code: String,
    /// Cause
    #[source]
    pub error: SandboxError,
}

impl ExecutionFailure {
    /// Create failure record
    pub fn new(suggestion: impl Into<String>, code: impl Into<String>, error: SandboxError) -> Self {
        Self {
            suggestion: suggestion.into(),
            code: code.into(),
            error,
        }
    }
}

/// Result type alias for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;
