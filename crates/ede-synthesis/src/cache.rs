//! Per-suggestion code synthesis cache
//!
//! Maps a suggestion string to code synthesized for it earlier in the
//! session. A hit never calls the oracle. Failed syntheses are not stored,
//! so the next request for the same suggestion retries.

use crate::code::SynthesizedCode;
use crate::error::{OracleError, SynthesisError, SynthesisResult};
use crate::oracle::Oracle;
use crate::parse::strip_code_fences;
use crate::prompt::synthesis_request;
use ede_eventlog::ColumnRoles;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on one synthesis call
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(90);

/// Whether cached code is reused when the column roles change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Key by suggestion only; code written for other column names is reused
    #[default]
    ReuseAcrossContexts,
    /// Key by suggestion and column roles
    KeyByColumnRoles,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    suggestion: String,
    roles: Option<ColumnRoles>,
}

/// Session-scoped suggestion → code cache in front of the oracle
#[derive(Clone)]
pub struct SynthesisCache {
    oracle: Arc<dyn Oracle>,
    entries: Cache<CacheKey, SynthesizedCode>,
    policy: StalenessPolicy,
    timeout: Duration,
}

impl SynthesisCache {
    /// Create empty cache backed by `oracle`
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            // unbounded: entries live for the session
            entries: Cache::builder().build(),
            policy: StalenessPolicy::default(),
            timeout: DEFAULT_SYNTHESIS_TIMEOUT,
        }
    }

    /// Set staleness policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: StalenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set oracle timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Oracle behind this cache
    #[inline]
    #[must_use]
    pub fn oracle(&self) -> &Arc<dyn Oracle> {
        &self.oracle
    }

    fn key(&self, suggestion: &str, roles: &ColumnRoles) -> CacheKey {
        CacheKey {
            suggestion: suggestion.to_string(),
            roles: match self.policy {
                StalenessPolicy::ReuseAcrossContexts => None,
                StalenessPolicy::KeyByColumnRoles => Some(roles.clone()),
            },
        }
    }

    /// Return cached code for `suggestion`, synthesizing it on a miss.
    ///
    /// Under [`StalenessPolicy::ReuseAcrossContexts`] a hit is returned even if
    /// `roles` differ from the roles the code was written for.
    ///
    /// # Errors
    /// [`SynthesisError::SynthesisFailed`] if the oracle fails, times out or
    /// returns no code. Nothing is cached in that case.
    pub async fn get_or_create(
        &self,
        suggestion: &str,
        roles: &ColumnRoles,
    ) -> SynthesisResult<SynthesizedCode> {
        let key = self.key(suggestion, roles);
        if let Some(code) = self.entries.get(&key).await {
            tracing::debug!(suggestion, hash = %code.hash().short(), "synthesis cache hit");
            return Ok(code);
        }

        tracing::debug!(suggestion, "synthesis cache miss");
        self.entries
            .try_get_with(key, self.synthesize(suggestion, roles))
            .await
            .map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(|arc| (*arc).clone()))
    }

    async fn synthesize(
        &self,
        suggestion: &str,
        roles: &ColumnRoles,
    ) -> SynthesisResult<SynthesizedCode> {
        let request = synthesis_request(suggestion, roles);
        let raw = tokio::time::timeout(self.timeout, self.oracle.complete(&request))
            .await
            .map_err(|_| SynthesisError::failed(suggestion, OracleError::Timeout(self.timeout)))?
            .map_err(|e| SynthesisError::failed(suggestion, e))?;

        let source = strip_code_fences(&raw);
        if source.is_empty() {
            return Err(SynthesisError::failed(suggestion, OracleError::EmptyResponse));
        }
        let code = SynthesizedCode::new(suggestion, source, roles.clone());
        tracing::info!(suggestion, hash = %code.hash().short(), "synthesized code");
        Ok(code)
    }

    /// Check for a cached entry without synthesizing
    pub async fn contains(&self, suggestion: &str, roles: &ColumnRoles) -> bool {
        self.entries.get(&self.key(suggestion, roles)).await.is_some()
    }

    /// Store code directly, replacing any cached entry
    pub async fn insert(&self, code: SynthesizedCode) {
        let key = self.key(code.suggestion(), code.roles());
        self.entries.insert(key, code).await;
    }

    /// Drop every entry (new dataset loaded)
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl fmt::Debug for SynthesisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisCache")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}
