//! EDE Core - Exploration session orchestrator
//!
//! Drives the pipeline end to end:
//! - Narrows the event log to its most frequent variants
//! - Asks the oracle for analysis ideas and synthesizes code for them
//! - Runs the code in the sandbox and registers the captured artifacts
//! - Binds feedback and exports the report
//!
//! # Example
//!
//! ```rust,ignore
//! use ede_core::{EdeConfig, ExplorationSession};
//! use ede_synthesis::ChatCompletionsOracle;
//! use std::sync::Arc;
//!
//! # async fn example(log: ede_eventlog::EventLog) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EdeConfig::load("ede.toml")?;
//! let oracle = Arc::new(ChatCompletionsOracle::new(config.oracle.clone())?);
//! let mut session = ExplorationSession::new(config, oracle);
//!
//! session.load_dataset(log);
//! session.set_question("Where do cases stall?");
//! let ideas = session.suggest().await?;
//! let outcomes = session.run_selected(&ideas[..2], Some(0.8)).await?;
//! println!("{} runs", outcomes.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod session;

pub use config::{EdeConfig, ENV_API_KEY, ENV_ENDPOINT, ENV_MODEL};
pub use error::{ConfigError, ConfigResult, SessionError, SessionResult};
pub use session::{ExplorationSession, RunOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
