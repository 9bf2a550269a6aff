//! Fixed prompt contracts for suggestion and code synthesis requests

use crate::oracle::{OracleMessage, OracleRequest};
use ede_eventlog::ColumnRoles;

/// Name of the function synthesized code must define
pub const ENTRY_POINT: &str = "build_plot";

/// Chart types synthesized metadata may declare
pub const CHART_TYPES: [&str; 5] = ["bar_chart", "line_chart", "histogram", "heatmap", "table"];

/// Modules synthesized code may import
pub const ALLOWED_MODULES: [&str; 11] = [
    "pandas",
    "numpy",
    "matplotlib",
    "seaborn",
    "math",
    "statistics",
    "datetime",
    "collections",
    "itertools",
    "re",
    "textwrap",
];

/// Largest number of categories a chart axis should show
pub const MAX_AXIS_CATEGORIES: usize = 15;

/// Analyses already covered by the canned exploration pages
pub const DEFAULT_EXCLUDED_LABELS: [&str; 21] = [
    "absolute activity frequency",
    "relative activity frequency",
    "absolute case frequency",
    "relative case frequency",
    "event attribute frequency",
    "case length distribution",
    "events per time",
    "daily event distribution",
    "weekly event distribution",
    "monthly event distribution",
    "yearly event distribution",
    "dotted chart",
    "case duration distribution",
    "task responsibility heatmap",
    "resource attribute frequency",
    "start activities",
    "end activities",
    "DECLARE model",
    "footprint model",
    "BPMN model",
    "case variant distribution",
];

const SUGGESTION_TEMPERATURE: f32 = 0.6;
const SYNTHESIS_TEMPERATURE: f32 = 0.4;

/// Default excluded labels as owned strings
#[must_use]
pub fn default_excluded_labels() -> Vec<String> {
    DEFAULT_EXCLUDED_LABELS.iter().map(ToString::to_string).collect()
}

/// Request for 4-6 chart ideas answering `question`
#[must_use]
pub fn suggestion_request(question: &str, excluded_labels: &[String]) -> OracleRequest {
    let excluded = if excluded_labels.is_empty() {
        "none".to_string()
    } else {
        excluded_labels.join(", ")
    };
    let system = format!(
        "You assist domain experts who validate process-mining event logs.\n\
         \n\
         For the analysis question you receive, propose 4 to 6 simple chart ideas that show \
         whether the event log is fit for its intended use.\n\
         \n\
         Preferred forms: bar charts of the top-N categories, histograms, box plots, line \
         charts over time and small heatmaps. A few ideas may target outliers such as very \
         long cases, unusually frequent activities or rare variants, as long as the chart \
         itself stays simple.\n\
         Do not propose complex charts: large correlation matrices, parallel coordinates, \
         Sankey diagrams, dendrograms, layered composite charts or handover networks.\n\
         \n\
         Do not repeat analyses that are already available: {excluded}.\n\
         \n\
         Answer with a bullet list only (\"- \" per line). Each line holds one idea: a short \
         title followed by a one-sentence explanation. No code, no headings, no paragraphs."
    );
    OracleRequest {
        messages: vec![
            OracleMessage::system(system),
            OracleMessage::user(format!("My analysis question is: {question}")),
        ],
        temperature: SUGGESTION_TEMPERATURE,
    }
}

/// Request for code implementing one suggestion against the given columns
#[must_use]
pub fn synthesis_request(suggestion: &str, roles: &ColumnRoles) -> OracleRequest {
    let resource = roles
        .resource
        .as_deref()
        .map(|column| format!("- df['{column}']: resource or performer (may be missing)\n"))
        .unwrap_or_default();
    let chart_types = CHART_TYPES
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let modules = ALLOWED_MODULES.join(", ");
    let user = format!(
        "You write Python for analysing process-mining event logs.\n\
         \n\
         The caller passes a pandas DataFrame `df` with at least these columns:\n\
         - df['{case}']: case identifier\n\
         - df['{activity}']: activity label\n\
         - df['{timestamp}']: event timestamp (ISO 8601 text; convert with pd.to_datetime)\n\
         {resource}\
         \n\
         Write plain Python source, without markdown fences, defining exactly one function:\n\
         \n\
         \x20   def {entry}(df):\n\
         \x20       # build exactly one matplotlib figure\n\
         \x20       return fig, meta\n\
         \n\
         `meta` is a dict with:\n\
         - \"title\": short title matching the figure\n\
         - \"type\": one of [{chart_types}]\n\
         - \"description\": two or three sentences on what the chart shows\n\
         - \"x_axis\": x axis label (\"\" for tables)\n\
         - \"y_axis\": y axis label (\"\" for tables)\n\
         \n\
         Rules:\n\
         - Never call .boxplot() on a groupby object (for example df.groupby(\"x\")[\"y\"].boxplot()). \
         For box plots per group pass a list of 1-D arrays to ax.boxplot(groups, labels=names) \
         or use seaborn.boxplot(x=..., y=..., data=...).\n\
         - Show at most {max_categories} categories on any axis, sorted by frequency; fold the \
         remainder into a single \"+N more\" (or \"Other\") entry.\n\
         - Rotate x tick labels by 45 degrees, right aligned, when there are many categories.\n\
         - Prefer bar charts, histograms, box plots, line charts and small heatmaps.\n\
         - Focus on data quality: unusual durations, rare activities, skewed distributions.\n\
         - Import only from: {modules}. Put imports inside the code.\n\
         - Do not show or save anything (no plt.show, no savefig, no to_csv) and do not use Streamlit.\n\
         \n\
         Chart to implement:\n\"\"\"{suggestion}\"\"\"",
        case = roles.case_id,
        activity = roles.activity,
        timestamp = roles.timestamp,
        entry = ENTRY_POINT,
        max_categories = MAX_AXIS_CATEGORIES,
    );
    OracleRequest {
        messages: vec![
            OracleMessage::system(
                "You write safe, self-contained Python functions for data visualization.",
            ),
            OracleMessage::user(user),
        ],
        temperature: SYNTHESIS_TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_request_lists_exclusions() {
        let request = suggestion_request("Is the log complete?", &["dotted chart".to_string()]);
        assert!(request.messages[0].content.contains("already available: dotted chart."));
        assert_eq!(
            request.user_text(),
            Some("My analysis question is: Is the log complete?")
        );
    }

    #[test]
    fn suggestion_request_without_exclusions_says_none() {
        let request = suggestion_request("q", &[]);
        assert!(request.messages[0].content.contains("already available: none."));
    }

    #[test]
    fn synthesis_request_embeds_contract_and_roles() {
        let roles = ColumnRoles::csv();
        let request = synthesis_request("Bar chart of X", &roles);
        let text = request.user_text().unwrap();
        assert!(text.contains("df['Case ID']"));
        assert!(text.contains("df['Complete Timestamp']"));
        assert!(text.contains("df['Resource']"));
        assert!(text.contains("    def build_plot(df):"));
        assert!(text.contains("Never call .boxplot() on a groupby object"));
        assert!(text.contains("at most 15 categories"));
        assert!(text.ends_with("\"\"\"Bar chart of X\"\"\""));
    }

    #[test]
    fn synthesis_request_omits_absent_resource() {
        let roles = ColumnRoles::new("case", "activity", "ts");
        let text = synthesis_request("Bar chart of X", &roles)
            .user_text()
            .unwrap()
            .to_string();
        assert!(!text.contains("df['']"));
        assert!(!text.contains("resource or performer"));
        assert!(text.contains("df['ts']: event timestamp"));
        assert!(text.contains("pd.to_datetime)\n\nWrite plain Python source"));
    }

    #[test]
    fn default_exclusions_cover_canned_pages() {
        let labels = default_excluded_labels();
        assert!(labels.iter().any(|l| l == "BPMN model"));
        assert_eq!(labels.len(), DEFAULT_EXCLUDED_LABELS.len());
    }
}
