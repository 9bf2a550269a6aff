//! EDE Artifact System
//!
//! Report-ready analysis results and the registry that keeps them stable
//! across re-executed analysis runs.
//!
//! # Core Concepts
//!
//! - [`Artifact`]: a captured chart or table addressed by an [`ArtifactKey`]
//! - [`ArtifactMetadata`]: leniently parsed producer metadata
//! - [`Annotation`]: note, legend or feedback text bound to one key
//! - [`ArtifactRegistry`]: upsert store preserving first-insertion order
//! - [`ContentHash`]: Blake3 identity for datasets and code blobs
//!
//! # Example
//!
//! ```rust
//! use ede_artifact::{Artifact, ArtifactKey, ArtifactPayload, ArtifactRegistry};
//!
//! let mut registry = ArtifactRegistry::new();
//! let key = ArtifactKey::from_text("Bar chart of X");
//! let rows = vec![("cases".to_string(), "42".to_string())];
//!
//! registry.upsert(Artifact::new(key.clone(), "X", ArtifactPayload::KeyValueTable { rows: rows.clone() }));
//! registry.upsert(Artifact::new(key, "X (re-run)", ArtifactPayload::KeyValueTable { rows }));
//!
//! assert_eq!(registry.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod annotation;
mod artifact;
mod hash;
mod metadata;
mod registry;

pub use annotation::{Annotation, AnnotationKind};
pub use artifact::{
    Artifact, ArtifactKey, ArtifactKind, ArtifactPayload, DEFAULT_KEY_PREFIX, MAX_SLUG_LEN,
};
pub use hash::{ContentHash, HashError};
pub use metadata::ArtifactMetadata;
pub use registry::{ArtifactRegistry, UpsertOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
