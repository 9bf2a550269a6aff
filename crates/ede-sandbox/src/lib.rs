//! EDE Sandbox
//!
//! Executes oracle-authored analysis code outside the host process.
//!
//! The code runs in a fresh interpreter with an empty environment, a private
//! working directory, a wall-clock timeout, an address-space cap and an import
//! allow-list. The entry point receives a private copy of the dataset. Results
//! come back as a JSON envelope and become registry [`Artifact`]s.
//!
//! This bounds what generated code can do; it is not a hardened security
//! boundary against a hostile interpreter.
//!
//! [`Artifact`]: ede_artifact::Artifact

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod executor;
mod harness;
mod runtime;

pub use config::SandboxConfig;
pub use error::{ExecutionFailure, SandboxError, SandboxResult};
pub use executor::{Execution, SandboxedExecutor, ORIGIN};
pub use harness::{
    CapturedArtifact, Envelope, EnvelopeStatus, HarnessJob, ENVELOPE_MARKER, HARNESS_SOURCE,
    MAX_CAPTURED_ROWS,
};
pub use runtime::{RuntimeOutput, ScriptRuntime, SubprocessRuntime};
