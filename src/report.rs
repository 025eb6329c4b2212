//! Diagnostic aggregation and the lint report

use crate::diagnostic::{Diagnostic, Severity};
use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-rule timing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTiming {
    /// Rule ID
    pub rule_id: String,
    /// Total time spent on this rule
    pub total_time: Duration,
    /// Number of selector evaluations
    pub selector_evaluations: usize,
    /// Number of matches found
    pub match_count: usize,
}

impl RuleTiming {
    pub fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            ..Default::default()
        }
    }
}

/// A rule that could not run to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure {
    pub rule_id: String,
    pub reason: String,
}

/// Result of one lint run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Diagnostics in document order, then rule ID
    pub diagnostics: Vec<Diagnostic>,

    /// At least one `error` diagnostic
    pub has_errors: bool,

    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub hint_count: usize,

    /// Rules that ran to completion
    pub rules_evaluated: usize,

    /// Rules that errored or were skipped by the deadline
    pub rule_failures: Vec<RuleFailure>,

    /// The run deadline expired before every rule ran
    pub timed_out: bool,

    /// Per-rule timings, in evaluation order
    #[serde(skip)]
    pub rule_timings: Vec<RuleTiming>,

    #[serde(skip)]
    pub duration: Duration,
}

impl Report {
    /// Every rule ran
    pub fn is_complete(&self) -> bool {
        self.rule_failures.is_empty() && !self.timed_out
    }

    /// Complete and without diagnostics
    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.diagnostics.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// Get exit code (0 = no errors, 1 = errors, 2 = run incomplete)
    pub fn exit_code(&self) -> i32 {
        if !self.is_complete() {
            2
        } else if self.has_errors {
            1
        } else {
            0
        }
    }

    pub fn timing(&self, rule_id: &str) -> Option<&RuleTiming> {
        self.rule_timings.iter().find(|t| t.rule_id == rule_id)
    }

    /// Diagnostics for one rule
    pub fn diagnostics_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.rule_id == rule_id)
    }
}

/// Sort, deduplicate and classify the diagnostics of one run.
///
/// Ordering is by location in depth-first document order, then rule ID,
/// then message, so the result does not depend on evaluation order.
/// Diagnostics with the same rule ID, path and message collapse to one.
pub fn aggregate(document: &Document, diagnostics: Vec<Diagnostic>) -> Report {
    let mut keyed: Vec<_> = diagnostics
        .into_iter()
        .map(|d| (document.ordinal(&d.path), d))
        .collect();

    keyed.sort_by(|(a_ord, a), (b_ord, b)| {
        a_ord
            .cmp(b_ord)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.message.cmp(&b.message))
    });
    keyed.dedup_by(|(_, a), (_, b)| {
        a.rule_id == b.rule_id && a.path == b.path && a.message == b.message
    });

    let diagnostics: Vec<Diagnostic> = keyed.into_iter().map(|(_, d)| d).collect();
    let count = |severity: Severity| diagnostics.iter().filter(|d| d.severity == severity).count();

    Report {
        has_errors: diagnostics.iter().any(Diagnostic::is_error),
        error_count: count(Severity::Error),
        warning_count: count(Severity::Warn),
        info_count: count(Severity::Info),
        hint_count: count(Severity::Hint),
        diagnostics,
        ..Report::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::JsonPath;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> Document {
        Document::new(json!({
            "openapi": "3.0.3",
            "servers": [{"url": "a"}, {"url": "b"}],
            "paths": {"/b": {}, "/a": {}}
        }))
    }

    fn diag(rule: &str, severity: Severity, path: JsonPath) -> Diagnostic {
        Diagnostic::new(rule, severity, path, "m")
    }

    #[test]
    fn test_document_order_then_rule() {
        let root = JsonPath::root();
        let input = vec![
            diag("z", Severity::Warn, root.clone().key("paths").key("/a")),
            diag("b", Severity::Error, root.clone().key("servers").index(1).key("url")),
            diag("a", Severity::Warn, root.clone().key("paths").key("/b")),
            diag("a", Severity::Error, root.clone().key("servers").index(1).key("url")),
            diag("y", Severity::Info, root.clone().key("openapi")),
            diag("x", Severity::Hint, root.clone().key("servers").index(0).key("missing")),
        ];

        let report = aggregate(&document(), input);
        let order: Vec<(String, String)> = report
            .diagnostics
            .iter()
            .map(|d| (d.rule_id.clone(), d.path.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("y".to_string(), "openapi".to_string()),
                ("x".to_string(), "servers[0].missing".to_string()),
                ("a".to_string(), "servers[1].url".to_string()),
                ("b".to_string(), "servers[1].url".to_string()),
                ("a".to_string(), "paths['/b']".to_string()),
                ("z".to_string(), "paths['/a']".to_string()),
            ]
        );
        assert!(report.has_errors);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.warning_count, 2);
        assert_eq!(report.info_count, 1);
        assert_eq!(report.hint_count, 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let path = JsonPath::root().key("openapi");
        let input = vec![
            diag("r", Severity::Warn, path.clone()),
            diag("r", Severity::Warn, path.clone()),
            Diagnostic::new("r", Severity::Warn, path.clone(), "other"),
        ];
        let report = aggregate(&document(), input);
        assert_eq!(report.diagnostics.len(), 2);
        assert!(!report.has_errors);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_filter_by_rule_and_warnings() {
        let root = JsonPath::root();
        let report = aggregate(
            &document(),
            vec![
                diag("casing", Severity::Warn, root.clone().key("paths").key("/a")),
                diag("https", Severity::Error, root.clone().key("servers").index(0).key("url")),
                diag("casing", Severity::Warn, root.clone().key("paths").key("/b")),
            ],
        );
        assert!(report.has_warnings());

        let casing: Vec<String> = report.diagnostics_for("casing").map(|d| d.path.to_string()).collect();
        assert_eq!(casing, vec!["paths['/b']", "paths['/a']"]);
        assert_eq!(report.diagnostics_for("missing").count(), 0);

        let errors_only = aggregate(
            &document(),
            vec![diag("https", Severity::Error, root.key("openapi"))],
        );
        assert!(!errors_only.has_warnings());
    }

    #[test]
    fn test_exit_codes() {
        let mut report = aggregate(
            &document(),
            vec![diag("r", Severity::Error, JsonPath::root().key("openapi"))],
        );
        assert_eq!(report.exit_code(), 1);

        report.rule_failures.push(RuleFailure {
            rule_id: "bad".to_string(),
            reason: "Unknown function: nope".to_string(),
        });
        assert_eq!(report.exit_code(), 2);

        let mut clean = aggregate(&document(), Vec::new());
        assert!(clean.is_clean());
        clean.timed_out = true;
        assert!(!clean.is_clean());
        assert_eq!(clean.exit_code(), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let report = aggregate(
            &document(),
            vec![diag("r", Severity::Error, JsonPath::root().key("servers").index(0).key("url"))],
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["hasErrors"], json!(true));
        assert_eq!(value["diagnostics"][0]["ruleId"], json!("r"));
        assert_eq!(value["diagnostics"][0]["path"], json!(["servers", 0, "url"]));
        assert!(value.get("ruleTimings").is_none());
    }
}
