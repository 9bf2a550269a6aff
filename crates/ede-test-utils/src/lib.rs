//! Testing utilities for EDE workspace
//!
//! Event-log builders, a scripted oracle and a canned sandbox runtime, so the
//! whole pipeline can be driven without network access or an interpreter.

#![allow(missing_docs)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, TimeZone, Utc};
use ede_eventlog::{ColumnRoles, Event, EventLog};
use ede_sandbox::{
    CapturedArtifact, Envelope, EnvelopeStatus, HarnessJob, RuntimeOutput, SandboxResult,
    ScriptRuntime,
};
use ede_synthesis::{Oracle, OracleError, OracleRequest};
use image::{ImageBuffer, ImageOutputFormat, Rgb};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Code that defines the entry point and raises inside it
pub const RAISING_CODE: &str = "def build_plot(df):\n    raise ValueError('boom')\n";

/// Code without the entry point
pub const NO_ENTRY_POINT_CODE: &str = "def plot_it(df):\n    return None, {}\n";

/// Build a log where each `(variant, cases)` pair contributes `cases` cases
/// following the comma-separated activity sequence `variant`.
pub fn log_from_variants(variants: &[(&str, usize)]) -> EventLog {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let mut events = Vec::new();
    for (v, (variant, cases)) in variants.iter().enumerate() {
        for c in 0..*cases {
            let case_id = format!("v{v}-c{c}");
            for (i, activity) in variant.split(',').enumerate() {
                let at = start + Duration::minutes(i64::try_from(i).unwrap());
                events.push(Event::new(case_id.clone(), activity.trim(), at).with_resource("clerk"));
            }
        }
    }
    EventLog::new(ColumnRoles::xes(), events).unwrap()
}

/// 100 cases: A×60, B×25, C×10, D×5
pub fn abcd_log() -> EventLog {
    log_from_variants(&[
        ("Register,Check,Pay", 60),
        ("Register,Pay", 25),
        ("Register,Check,Reject", 10),
        ("Register,Cancel", 5),
    ])
}

/// Black PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

/// Default code the scripted oracle writes for a suggestion
pub fn default_code(suggestion: &str) -> String {
    format!(
        "# {suggestion}\nimport matplotlib.pyplot as plt\n\ndef build_plot(df):\n    fig, ax = plt.subplots()\n    return fig, {{}}\n"
    )
}

/// Oracle answering from a script and counting calls
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    suggestions: Vec<String>,
    code: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    suggestion_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer suggestion requests with these lines as a bullet list
    pub fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = suggestions.iter().map(ToString::to_string).collect();
        self
    }

    /// Answer synthesis of `suggestion` with `source` (fenced, like real replies)
    pub fn with_code(self, suggestion: &str, source: &str) -> Self {
        self.code
            .lock()
            .unwrap()
            .insert(suggestion.to_string(), source.to_string());
        self
    }

    /// Make synthesis of `suggestion` fail as unreachable
    pub fn failing_for(self, suggestion: &str) -> Self {
        self.set_failing(suggestion, true);
        self
    }

    /// Toggle failure for `suggestion` after construction
    pub fn set_failing(&self, suggestion: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(suggestion.to_string());
        } else {
            set.remove(suggestion);
        }
    }

    pub fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }
}

/// Suggestion named in a synthesis prompt
pub fn requested_suggestion(request: &OracleRequest) -> Option<String> {
    let text = request.user_text()?;
    let start = text.rfind("Chart to implement:\n\"\"\"")? + "Chart to implement:\n\"\"\"".len();
    let rest = &text[start..];
    let end = rest.rfind("\"\"\"")?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        if request
            .user_text()
            .is_some_and(|t| t.starts_with("My analysis question is:"))
        {
            self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
            let lines: Vec<String> = self.suggestions.iter().map(|s| format!("- {s}")).collect();
            return Ok(lines.join("\n"));
        }

        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        let suggestion = requested_suggestion(request)
            .ok_or_else(|| OracleError::MalformedResponse("unrecognized request".into()))?;
        if self.failing.lock().unwrap().contains(&suggestion) {
            return Err(OracleError::Unreachable("connection refused".into()));
        }
        let source = self
            .code
            .lock()
            .unwrap()
            .get(&suggestion)
            .cloned()
            .unwrap_or_else(|| default_code(&suggestion));
        Ok(format!("```python\n{source}```"))
    }
}

/// Runtime that answers like the harness without running anything.
///
/// Code containing `raise ` fails with an execution error; anything else
/// yields a 40×30 figure. A `# meta: {json}` line becomes the metadata.
#[derive(Debug, Default)]
pub struct CannedRuntime {
    record_counts: Mutex<Vec<usize>>,
}

impl CannedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        self.record_counts.lock().unwrap().len()
    }

    /// Number of records handed to each run, in order
    pub fn record_counts(&self) -> Vec<usize> {
        self.record_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptRuntime for CannedRuntime {
    async fn run(&self, job: &HarnessJob) -> SandboxResult<RuntimeOutput> {
        self.record_counts.lock().unwrap().push(job.records.len());

        let envelope = if job.code.contains("raise ") {
            Envelope::failed(
                EnvelopeStatus::ExecutionError,
                "ValueError: boom\nTraceback (most recent call last): ...",
            )
        } else {
            let metadata = job
                .code
                .lines()
                .find_map(|l| l.trim().strip_prefix("# meta: "))
                .and_then(|m| serde_json::from_str(m).ok())
                .unwrap_or(Value::Null);
            Envelope::ok(
                CapturedArtifact::Figure {
                    png_base64: STANDARD.encode(png(40, 30)),
                },
                metadata,
            )
        };

        Ok(RuntimeOutput {
            stdout: envelope.to_line(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}
