//! Static checks on synthesized code before it is executed
//!
//! These are cheap textual checks. They catch the known failure patterns of
//! naive synthesis early; they are no substitute for the sandbox.

use crate::prompt::{ALLOWED_MODULES, ENTRY_POINT};
use regex::Regex;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::sync::OnceLock;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Code may still run
    Warning,
    /// Code cannot satisfy the entry-point contract
    Error,
}

/// Rule that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintRule {
    /// No top-level `def build_plot(df)`
    MissingEntryPoint,
    /// `.boxplot()` called on a groupby result
    GroupedBoxplot,
    /// Import outside the allow-list
    DisallowedImport,
    /// `plt.show()`, `savefig`, `to_csv` and friends
    SideEffectCall,
    /// Streamlit used inside analysis code
    StreamlitReference,
}

impl LintRule {
    /// Severity of this rule
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::MissingEntryPoint => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    /// Rule
    pub rule: LintRule,
    /// 1-based line, 0 when the finding is about the whole file
    pub line: usize,
    /// Explanation
    pub message: String,
}

impl Display for LintFinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// All findings for one code blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    findings: Vec<LintFinding>,
}

impl LintReport {
    /// Findings in source order
    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[LintFinding] {
        &self.findings
    }

    /// Check if any finding is an error
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.rule.severity() == Severity::Error)
    }

    /// Check if a rule fired
    #[must_use]
    pub fn fired(&self, rule: LintRule) -> bool {
        self.findings.iter().any(|f| f.rule == rule)
    }

    /// Error findings joined into one message
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.findings
            .iter()
            .filter(|f| f.rule.severity() == Severity::Error)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Check if there are no findings
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

struct Patterns {
    entry_point: Regex,
    grouped_boxplot: Regex,
    import: Regex,
    side_effect: Regex,
    streamlit: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        entry_point: Regex::new(&format!(r"(?m)^def\s+{ENTRY_POINT}\s*\(\s*\w+"))
            .expect("entry point pattern is valid"),
        grouped_boxplot: Regex::new(r"groupby\([^)]*\)(?:\s*\[[^\]]*\])*\s*\.boxplot\s*\(")
            .expect("boxplot pattern is valid"),
        import: Regex::new(r"^\s*(?:from\s+([A-Za-z_][\w.]*)\s+import\b|import\s+(.+))")
            .expect("import pattern is valid"),
        side_effect: Regex::new(r"\b(?:plt\.show|\.show|\.savefig|\.to_csv|\.to_excel|open)\s*\(")
            .expect("side effect pattern is valid"),
        streamlit: Regex::new(r"\bstreamlit\b|\bst\.").expect("streamlit pattern is valid"),
    })
}

/// Top-level package of a dotted module path
fn root_module(path: &str) -> &str {
    path.split('.').next().unwrap_or(path).trim()
}

fn is_allowed(module: &str) -> bool {
    ALLOWED_MODULES.contains(&root_module(module))
}

/// Run all checks on synthesized source
#[must_use]
pub fn lint_synthesized_code(source: &str) -> LintReport {
    let p = patterns();
    let mut findings = Vec::new();

    if !p.entry_point.is_match(source) {
        findings.push(LintFinding {
            rule: LintRule::MissingEntryPoint,
            line: 0,
            message: format!("no top-level `def {ENTRY_POINT}(df)` found"),
        });
    }

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let code = line.split('#').next().unwrap_or_default();
        if code.trim().is_empty() {
            continue;
        }

        if p.grouped_boxplot.is_match(code) {
            findings.push(LintFinding {
                rule: LintRule::GroupedBoxplot,
                line: line_no,
                message: "`.boxplot()` on a groupby object; pass per-group arrays to ax.boxplot instead"
                    .to_string(),
            });
        }

        if let Some(caps) = p.import.captures(code) {
            let modules: Vec<&str> = match (caps.get(1), caps.get(2)) {
                (Some(from), _) => vec![from.as_str()],
                (None, Some(list)) => list
                    .as_str()
                    .split(',')
                    .filter_map(|item| item.split_whitespace().next())
                    .collect(),
                _ => Vec::new(),
            };
            for module in modules.into_iter().filter(|m| !is_allowed(m)) {
                findings.push(LintFinding {
                    rule: LintRule::DisallowedImport,
                    line: line_no,
                    message: format!("import of `{module}` is not allowed"),
                });
            }
        }

        if p.streamlit.is_match(code) {
            findings.push(LintFinding {
                rule: LintRule::StreamlitReference,
                line: line_no,
                message: "streamlit is not available to analysis code".to_string(),
            });
        } else if p.side_effect.is_match(code) {
            findings.push(LintFinding {
                rule: LintRule::SideEffectCall,
                line: line_no,
                message: "figures and data must be returned, not shown or written".to_string(),
            });
        }
    }

    LintReport { findings }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "\
import pandas as pd
import matplotlib.pyplot as plt

def build_plot(df):
    counts = df['Activity'].value_counts().head(15)
    fig, ax = plt.subplots()
    counts.plot.bar(ax=ax)
    return fig, {'title': 'Top activities', 'type': 'bar_chart'}
";

    #[test]
    fn clean_code_has_no_findings() {
        let report = lint_synthesized_code(GOOD);
        assert!(report.is_clean(), "{:?}", report.findings());
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let report = lint_synthesized_code("def plot(df):\n    return None, {}\n");
        assert!(report.fired(LintRule::MissingEntryPoint));
        assert!(report.has_errors());
        assert_eq!(report.error_summary(), "no top-level `def build_plot(df)` found");
    }

    #[test]
    fn nested_entry_point_does_not_count() {
        let report = lint_synthesized_code("class X:\n    def build_plot(self, df):\n        pass\n");
        assert!(report.fired(LintRule::MissingEntryPoint));
    }

    #[test]
    fn flags_grouped_boxplot() {
        let code = format!("{GOOD}\n    df.groupby('variant')['duration'].boxplot()\n");
        let report = lint_synthesized_code(&code);
        assert!(report.fired(LintRule::GroupedBoxplot));
        assert!(!report.has_errors());
        let finding = &report.findings()[0];
        assert_eq!(finding.line, 10);
    }

    #[test]
    fn per_group_arrays_are_fine() {
        let code = format!(
            "{GOOD}\n    groups = [g['d'].values for _, g in df.groupby('v')]\n    ax.boxplot(groups, labels=names)\n"
        );
        assert!(!lint_synthesized_code(&code).fired(LintRule::GroupedBoxplot));
    }

    #[test]
    fn flags_disallowed_imports() {
        let code = format!("import os, numpy as np\nfrom subprocess import run\n{GOOD}");
        let report = lint_synthesized_code(&code);
        let messages: Vec<String> = report
            .findings()
            .iter()
            .filter(|f| f.rule == LintRule::DisallowedImport)
            .map(|f| f.message.clone())
            .collect();
        assert_eq!(
            messages,
            vec![
                "import of `os` is not allowed",
                "import of `subprocess` is not allowed"
            ]
        );
    }

    #[test]
    fn flags_show_and_streamlit() {
        let code = format!("{GOOD}\n    plt.show()\n    st.pyplot(fig)\n");
        let report = lint_synthesized_code(&code);
        assert!(report.fired(LintRule::SideEffectCall));
        assert!(report.fired(LintRule::StreamlitReference));
    }

    #[test]
    fn comments_are_ignored() {
        let code = format!("{GOOD}\n    # never call df.groupby('x')['y'].boxplot()\n");
        assert!(lint_synthesized_code(&code).is_clean());
    }
}
