//! EDE Synthesis
//!
//! Everything between an analysis question and executable analysis code:
//!
//! - [`Oracle`]: the text-completion seam, with [`ChatCompletionsOracle`] for
//!   OpenAI-compatible and Azure endpoints
//! - [`suggest`]: chart ideas for a question
//! - [`SynthesisCache`]: suggestion → [`SynthesizedCode`], one oracle call per
//!   suggestion per session
//! - [`lint_synthesized_code`]: static checks run before execution
//!
//! # Example
//!
//! ```rust,ignore
//! use ede_synthesis::{ChatCompletionsOracle, OracleConfig, SynthesisCache};
//! use std::sync::Arc;
//!
//! let oracle = Arc::new(ChatCompletionsOracle::new(OracleConfig::default())?);
//! let cache = SynthesisCache::new(oracle);
//! let code = cache.get_or_create("Bar chart of the top activities", &roles).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod code;
mod error;
mod lint;
mod oracle;
mod parse;
mod prompt;
mod suggest;

pub use cache::{StalenessPolicy, SynthesisCache, DEFAULT_SYNTHESIS_TIMEOUT};
pub use code::SynthesizedCode;
pub use error::{OracleError, SynthesisError, SynthesisResult};
pub use lint::{lint_synthesized_code, LintFinding, LintReport, LintRule, Severity};
pub use oracle::{
    ChatCompletionsOracle, Oracle, OracleConfig, OracleMessage, OracleProvider, OracleRequest,
    Role, DEFAULT_AZURE_API_VERSION,
};
pub use parse::{parse_suggestions, strip_code_fences, MAX_SUGGESTIONS};
pub use prompt::{
    default_excluded_labels, suggestion_request, synthesis_request, ALLOWED_MODULES,
    CHART_TYPES, DEFAULT_EXCLUDED_LABELS, ENTRY_POINT, MAX_AXIS_CATEGORIES,
};
pub use suggest::suggest;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
