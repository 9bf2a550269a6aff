//! Interpreter-side harness and its wire format
//!
//! The harness is a small Python program run in a fresh interpreter. It reads
//! a [`HarnessJob`] from the file named on its command line, executes the
//! synthesized code in a namespace holding nothing but a reduced set of
//! builtins, calls the entry point on a private DataFrame and prints one
//! [`Envelope`] line prefixed with [`ENVELOPE_MARKER`].

use base64::Engine as _;
use ede_artifact::ArtifactPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of the result line on stdout
pub const ENVELOPE_MARKER: &str = "@@EDE-ENVELOPE@@ ";

/// Largest number of rows captured from a returned DataFrame
pub const MAX_CAPTURED_ROWS: usize = 500;

/// Python source of the harness
pub const HARNESS_SOURCE: &str = r##"
import base64
import builtins
import io
import json
import sys
import traceback

MARKER = "@@EDE-ENVELOPE@@ "
MAX_ROWS = 500
SAFE_BUILTINS = (
    "abs", "all", "any", "bool", "callable", "chr", "dict", "divmod", "enumerate",
    "filter", "float", "format", "frozenset", "getattr", "hasattr", "hash", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min", "next",
    "object", "ord", "pow", "print", "range", "repr", "reversed", "round", "set",
    "setattr", "slice", "sorted", "str", "sum", "tuple", "type", "zip", "super",
    "property", "staticmethod", "classmethod", "__build_class__",
    "ArithmeticError", "AssertionError", "AttributeError", "Exception", "ImportError",
    "IndexError", "KeyError", "LookupError", "NotImplementedError", "RuntimeError",
    "StopIteration", "TypeError", "ValueError", "ZeroDivisionError",
)

REAL_STDOUT = sys.stdout


def emit(status, message="", artifact=None, metadata=None):
    envelope = {"status": status, "message": message, "artifact": artifact, "metadata": metadata}
    try:
        line = json.dumps(envelope, default=str, allow_nan=False)
    except ValueError:
        envelope["metadata"] = {}
        line = json.dumps(envelope, default=str, allow_nan=False)
    REAL_STDOUT.write(MARKER + line + "\n")
    REAL_STDOUT.flush()


def cell(value):
    if value is None:
        return ""
    try:
        if value != value:
            return ""
    except Exception:
        pass
    return str(value)


def capture(obj):
    if obj is None:
        return None
    if not hasattr(obj, "savefig") and hasattr(obj, "get_figure"):
        obj = obj.get_figure()
    if hasattr(obj, "savefig"):
        buf = io.BytesIO()
        obj.savefig(buf, format="png", bbox_inches="tight", dpi=150)
        return {"kind": "figure", "png_base64": base64.b64encode(buf.getvalue()).decode("ascii")}
    if hasattr(obj, "itertuples") and hasattr(obj, "columns"):
        rows = [[cell(v) for v in row] for row in obj.head(MAX_ROWS).itertuples(index=False)]
        return {
            "kind": "rows",
            "columns": [str(c) for c in obj.columns],
            "rows": rows,
            "omitted_rows": max(len(obj) - len(rows), 0),
        }
    if hasattr(obj, "to_frame") and hasattr(obj, "items"):
        rows = [[cell(k), cell(v)] for k, v in list(obj.items())[:MAX_ROWS]]
        return {"kind": "pairs", "rows": rows, "omitted_rows": max(len(obj) - len(rows), 0)}
    if isinstance(obj, dict):
        return {"kind": "pairs", "rows": [[cell(k), cell(v)] for k, v in obj.items()]}
    return None


def limit_memory(limit):
    if not limit:
        return
    try:
        import resource
        resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
    except (ImportError, ValueError, OSError):
        pass


def main():
    with open(sys.argv[1], "r", encoding="utf-8") as fh:
        job = json.load(fh)

    import matplotlib
    matplotlib.use("Agg")
    import pandas as pd

    df = pd.DataFrame.from_records(job["records"])
    ts = job.get("timestamp_column")
    if ts and ts in df.columns:
        df[ts] = pd.to_datetime(df[ts], utc=True, errors="coerce")

    limit_memory(job.get("memory_limit_bytes"))

    allowed = set(job["allowed_modules"])
    real_import = builtins.__import__

    def guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
        if level != 0 or name.split(".")[0] not in allowed:
            raise ImportError("import of '%s' is not allowed" % name)
        return real_import(name, globals, locals, fromlist, level)

    safe = {name: getattr(builtins, name) for name in SAFE_BUILTINS if hasattr(builtins, name)}
    safe["__import__"] = guarded_import
    namespace = {"__builtins__": safe, "__name__": "analysis"}
    entry = job["entry_point"]

    try:
        compiled = compile(job["code"], "<synthesized>", "exec")
    except SyntaxError as exc:
        emit("compile_error", "%s (line %s)" % (exc.msg, exc.lineno))
        return

    sys.stdout = io.StringIO()
    try:
        exec(compiled, namespace)
    except BaseException as exc:
        emit("execution_error", "%s: %s" % (type(exc).__name__, exc))
        return

    fn = namespace.get(entry)
    if not callable(fn):
        emit("contract_violation", "code does not define a callable %s(df)" % entry)
        return

    try:
        result = fn(df.copy())
    except BaseException as exc:
        tb = traceback.format_exception(type(exc), exc, exc.__traceback__)
        emit("execution_error", "%s: %s\n%s" % (type(exc).__name__, exc, "".join(tb[-3:])))
        return

    if not isinstance(result, tuple) or len(result) != 2:
        emit("contract_violation", "%s must return a (figure, meta) pair" % entry)
        return

    fig, meta = result
    if not isinstance(meta, dict):
        meta = {}
    try:
        artifact = capture(fig)
    except BaseException as exc:
        emit("execution_error", "rendering failed: %s: %s" % (type(exc).__name__, exc))
        return
    if artifact is None:
        emit("contract_violation", "first return value is not a figure, DataFrame or mapping")
        return
    emit("ok", "", artifact, meta)


if __name__ == "__main__":
    try:
        main()
    except BaseException as exc:
        emit("execution_error", "harness failure: %s: %s" % (type(exc).__name__, exc))
"##;

/// Input handed to the harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessJob {
    /// Synthesized source
    pub code: String,
    /// Function to call
    pub entry_point: String,
    /// Importable top-level modules
    pub allowed_modules: Vec<String>,
    /// Address-space cap
    pub memory_limit_bytes: Option<u64>,
    /// Column parsed into datetimes before the call
    pub timestamp_column: Option<String>,
    /// Private copy of the dataset
    pub records: Vec<Value>,
}

/// Outcome reported by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Entry point returned a capturable pair
    Ok,
    /// Source did not compile
    CompileError,
    /// Entry point missing or wrong return shape
    ContractViolation,
    /// Exception while running
    ExecutionError,
}

/// Rendered first return value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapturedArtifact {
    /// Matplotlib figure as PNG
    Figure {
        /// Base64 PNG
        png_base64: String,
    },
    /// DataFrame
    Rows {
        /// Header
        columns: Vec<String>,
        /// Cells as text
        rows: Vec<Vec<String>>,
        /// Rows past [`MAX_CAPTURED_ROWS`] that were not captured
        #[serde(default)]
        omitted_rows: u64,
    },
    /// Series or dict
    Pairs {
        /// Key/value text pairs
        rows: Vec<(String, String)>,
        /// Entries past [`MAX_CAPTURED_ROWS`] that were not captured
        #[serde(default)]
        omitted_rows: u64,
    },
}

impl CapturedArtifact {
    /// Rows the harness left out of a table capture
    #[must_use]
    pub fn omitted_rows(&self) -> u64 {
        match self {
            Self::Figure { .. } => 0,
            Self::Rows { omitted_rows, .. } | Self::Pairs { omitted_rows, .. } => *omitted_rows,
        }
    }

    /// Convert into a registry payload
    ///
    /// # Errors
    /// Returns a message if the figure bytes are not valid base64.
    pub fn into_payload(self) -> Result<ArtifactPayload, String> {
        match self {
            Self::Figure { png_base64 } => base64::engine::general_purpose::STANDARD
                .decode(png_base64.as_bytes())
                .map(ArtifactPayload::png)
                .map_err(|e| format!("invalid figure encoding: {e}")),
            Self::Rows { columns, rows, .. } => Ok(ArtifactPayload::RowTable { columns, rows }),
            Self::Pairs { rows, .. } => Ok(ArtifactPayload::KeyValueTable { rows }),
        }
    }
}

/// One harness result line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Outcome
    pub status: EnvelopeStatus,
    /// Error text, empty on success
    #[serde(default)]
    pub message: String,
    /// Captured artifact on success
    #[serde(default)]
    pub artifact: Option<CapturedArtifact>,
    /// Raw metadata mapping as returned by the code
    #[serde(default)]
    pub metadata: Value,
}

impl Envelope {
    /// Successful envelope
    #[must_use]
    pub fn ok(artifact: CapturedArtifact, metadata: Value) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            message: String::new(),
            artifact: Some(artifact),
            metadata,
        }
    }

    /// Failed envelope
    #[must_use]
    pub fn failed(status: EnvelopeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            artifact: None,
            metadata: Value::Null,
        }
    }

    /// Render as a stdout line the way the harness prints it
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{ENVELOPE_MARKER}{}\n",
            serde_json::to_string(self).unwrap_or_default()
        )
    }

    /// Find and parse the last envelope line in harness stdout.
    ///
    /// Returns `None` if no line carries the marker.
    ///
    /// # Errors
    /// Returns the JSON error if the marked line does not parse.
    pub fn from_stdout(stdout: &str) -> Option<Result<Self, serde_json::Error>> {
        stdout
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix(ENVELOPE_MARKER))
            .map(serde_json::from_str)
    }
}
