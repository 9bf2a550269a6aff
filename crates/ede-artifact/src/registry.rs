//! Order-preserving artifact registry
//!
//! Provides [`ArtifactRegistry`], the session-scoped store that analysis
//! producers upsert into and the report assembler reads from.
//!
//! # Invariants
//! - No two artifacts share a key.
//! - Upserting an existing key replaces the value in place; the artifact keeps
//!   the position of its first insertion.
//! - Annotations are addressed by `(kind, key)`; the latest write wins.
//! - Nothing is evicted. A new dataset means a new (or [`cleared`]) registry.
//!
//! [`cleared`]: ArtifactRegistry::clear

use crate::annotation::{Annotation, AnnotationKind};
use crate::artifact::{Artifact, ArtifactKey};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Key was new; artifact appended at `position`
    Inserted {
        /// Zero-based position in registry order
        position: usize,
    },
    /// Key existed; value replaced at its original `position`
    Replaced {
        /// Zero-based position in registry order
        position: usize,
    },
}

impl UpsertOutcome {
    /// Position of the artifact after the upsert
    #[inline]
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            Self::Inserted { position } | Self::Replaced { position } => position,
        }
    }

    /// True if an existing artifact was overwritten
    #[inline]
    #[must_use]
    pub fn is_replacement(self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Key-addressed artifact store with annotation slots
#[derive(Debug, Default, Clone)]
pub struct ArtifactRegistry {
    artifacts: IndexMap<ArtifactKey, Artifact>,
    annotations: HashMap<(AnnotationKind, ArtifactKey), Annotation>,
}

impl ArtifactRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace-in-place by key
    pub fn upsert(&mut self, artifact: Artifact) -> UpsertOutcome {
        let key = artifact.key().clone();
        // IndexMap::insert_full keeps the slot of an existing key
        let (position, previous) = self.artifacts.insert_full(key, artifact);
        if previous.is_some() {
            tracing::debug!(position, "replaced artifact in place");
            UpsertOutcome::Replaced { position }
        } else {
            tracing::debug!(position, "registered new artifact");
            UpsertOutcome::Inserted { position }
        }
    }

    /// All artifacts in first-insertion order
    #[must_use]
    pub fn get_all(&self) -> Vec<&Artifact> {
        self.artifacts.values().collect()
    }

    /// Iterate artifacts in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    /// Artifact by key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Check if key is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.artifacts.contains_key(key)
    }

    /// Number of registered artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Bind text under `(kind, key)`, overwriting any earlier text.
    ///
    /// The key does not have to be registered yet; feedback slots are often
    /// bound before the artifact they describe is re-registered.
    pub fn attach_annotation(
        &mut self,
        key: &ArtifactKey,
        kind: AnnotationKind,
        label: impl Into<String>,
        text: impl Into<String>,
    ) {
        let annotation = Annotation::new(kind, label, text);
        tracing::debug!(%key, %kind, "attached annotation");
        self.annotations.insert((kind, key.clone()), annotation);
    }

    /// Annotation of one kind for a key
    #[must_use]
    pub fn annotation(&self, key: &ArtifactKey, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations.get(&(kind, key.clone()))
    }

    /// Annotations for a key ordered note, legend, feedback
    #[must_use]
    pub fn get_annotations(&self, key: &ArtifactKey) -> Vec<&Annotation> {
        AnnotationKind::ORDERED
            .iter()
            .filter_map(|kind| self.annotation(key, *kind))
            .collect()
    }

    /// Total number of bound annotations
    #[inline]
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Drop all artifacts and annotations (new dataset loaded)
    pub fn clear(&mut self) {
        self.artifacts.clear();
        self.annotations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactPayload;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn table(key: &str, value: &str) -> Artifact {
        Artifact::new(
            ArtifactKey::new(key),
            key.to_uppercase(),
            ArtifactPayload::KeyValueTable {
                rows: vec![("v".to_string(), value.to_string())],
            },
        )
    }

    fn keys(registry: &ArtifactRegistry) -> Vec<&str> {
        registry.iter().map(|a| a.key().as_str()).collect()
    }

    #[test]
    fn registry_new_empty() {
        let registry = ArtifactRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get_all().is_empty());
    }

    #[test]
    fn upsert_appends_new_keys_in_order() {
        let mut registry = ArtifactRegistry::new();
        assert_eq!(registry.upsert(table("a", "1")), UpsertOutcome::Inserted { position: 0 });
        assert_eq!(registry.upsert(table("b", "1")), UpsertOutcome::Inserted { position: 1 });
        assert_eq!(keys(&registry), vec!["a", "b"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut registry = ArtifactRegistry::new();
        registry.upsert(table("a", "1"));
        registry.upsert(table("b", "1"));
        registry.upsert(table("c", "1"));

        let outcome = registry.upsert(table("a", "2"));

        assert_eq!(outcome, UpsertOutcome::Replaced { position: 0 });
        assert_eq!(registry.len(), 3);
        assert_eq!(keys(&registry), vec!["a", "b", "c"]);
        assert_eq!(registry.get(&ArtifactKey::new("a")), Some(&table("a", "2")));
    }

    #[test]
    fn annotation_same_kind_overwrites() {
        let mut registry = ArtifactRegistry::new();
        let key = ArtifactKey::new("a");
        registry.attach_annotation(&key, AnnotationKind::Feedback, "Feedback", "first");
        registry.attach_annotation(&key, AnnotationKind::Feedback, "Feedback", "second");

        assert_eq!(registry.annotation_count(), 1);
        let fb = registry.annotation(&key, AnnotationKind::Feedback).unwrap();
        assert_eq!(fb.text(), "second");
    }

    #[test]
    fn annotation_kinds_coexist_and_order() {
        let mut registry = ArtifactRegistry::new();
        let key = ArtifactKey::new("a");
        registry.attach_annotation(&key, AnnotationKind::Feedback, "", "fb");
        registry.attach_annotation(&key, AnnotationKind::Legend, "", "lg");
        registry.attach_annotation(&key, AnnotationKind::Note, "", "nt");

        let texts: Vec<&str> = registry.get_annotations(&key).iter().map(|a| a.text()).collect();
        assert_eq!(texts, vec!["nt", "lg", "fb"]);
        assert_eq!(
            registry.annotation(&key, AnnotationKind::Legend).map(Annotation::text),
            Some("lg")
        );
    }

    #[test]
    fn empty_annotation_differs_from_missing() {
        let mut registry = ArtifactRegistry::new();
        let bound = ArtifactKey::new("bound");
        registry.attach_annotation(&bound, AnnotationKind::Feedback, "Feedback", "");

        assert!(registry.annotation(&bound, AnnotationKind::Feedback).is_some());
        assert!(registry
            .annotation(&ArtifactKey::new("unbound"), AnnotationKind::Feedback)
            .is_none());
    }

    #[test]
    fn clear_resets_everything() {
        let mut registry = ArtifactRegistry::new();
        registry.upsert(table("a", "1"));
        registry.attach_annotation(&ArtifactKey::new("a"), AnnotationKind::Note, "", "n");
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.annotation_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_upsert_keeps_first_seen_order_and_last_value(
            writes in proptest::collection::vec((0..6usize, 0..100u32), 1..40)
        ) {
            let mut registry = ArtifactRegistry::new();
            let mut first_seen: Vec<String> = Vec::new();
            let mut last_value: HashMap<String, String> = HashMap::new();

            for (k, v) in &writes {
                let key = format!("k{k}");
                if !first_seen.contains(&key) {
                    first_seen.push(key.clone());
                }
                last_value.insert(key.clone(), v.to_string());
                registry.upsert(table(&key, &v.to_string()));
            }

            let seen: Vec<String> = registry.iter().map(|a| a.key().to_string()).collect();
            prop_assert_eq!(&seen, &first_seen);
            for artifact in registry.iter() {
                let expected = table(artifact.key().as_str(), &last_value[artifact.key().as_str()]);
                prop_assert_eq!(artifact, &expected);
            }
        }
    }
}
