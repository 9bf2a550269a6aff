//! Artifact metadata schema
//!
//! Producers (built-in analyses and synthesized code) hand back a loosely
//! typed mapping. [`ArtifactMetadata::from_value_lenient`] reads the known
//! fields and keeps everything else in `extra`; wrong types degrade to
//! `None` instead of failing the artifact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Known metadata fields plus free-form extras
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Human readable title declared by the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Chart type (`bar_chart`, `histogram`, `table`, ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    /// Explicit registry key requested by the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Short description of what the artifact shows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// X axis label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    /// Y axis label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
    /// Rows left out of a captured table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_rows: Option<u64>,
    /// Everything else (top-N breakdowns, thresholds, origin, ...)
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl ArtifactMetadata {
    /// Metadata with only a title
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Read metadata from an untyped value.
    ///
    /// Anything that is not a JSON object yields empty metadata. Known fields
    /// with a non-string value are dropped; blank strings count as absent.
    #[must_use]
    pub fn from_value_lenient(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        let mut take = |name: &str| match map.remove(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) if name == "title" => Some(n.to_string()),
            _ => None,
        };
        let title = take("title");
        let chart_type = take("type");
        let key = take("key");
        let description = take("description");
        let x_axis = take("x_axis");
        let y_axis = take("y_axis");
        let truncated_rows = map
            .remove("truncated_rows")
            .and_then(|v| v.as_u64())
            .filter(|&n| n > 0);
        Self {
            title,
            chart_type,
            key,
            description,
            x_axis,
            y_axis,
            truncated_rows,
            extra: map,
        }
    }

    /// Insert an extra field unless the producer already set it
    pub fn set_default(&mut self, name: &str, value: impl Into<Value>) {
        self.extra
            .entry(name.to_string())
            .or_insert_with(|| value.into());
    }

    /// Extra field by name
    #[must_use]
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}
