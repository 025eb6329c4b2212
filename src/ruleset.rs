//! Rulesets: named bundles of rules, loaded from YAML or JSON
//!
//! ```yaml
//! uri: https://logius-standaarden.github.io/API-Design-Rules
//! description: NLGov REST API Design Rules
//! documentationUrl: https://logius-standaarden.github.io/API-Design-Rules
//! formats: [oas3_0]
//! rules:
//!   paths-no-trailing-slash:
//!     severity: error
//!     given: $.paths
//!     then: { field: "@key", function: pattern, functionOptions: { notMatch: ".+\\/$" } }
//! ```

use crate::rule::Rule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error loading a ruleset
#[derive(Debug, Error)]
pub enum RulesetLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Invalid ruleset {uri}: {message}")]
    Invalid { uri: String, message: String },
}

/// A named bundle of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Identity; doubles as the profile documents declare
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default documentation link for rules that carry none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    /// Format families this ruleset applies to (e.g. `oas3_0`)
    #[serde(default)]
    pub formats: Vec<String>,

    /// Rules keyed by ID, in declaration order
    #[serde(default)]
    pub rules: IndexMap<String, Rule>,
}

impl Ruleset {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            description: None,
            documentation_url: None,
            formats: Vec::new(),
            rules: IndexMap::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.formats.push(format.to_string());
        self
    }

    /// Add a rule, replacing any rule with the same ID in place
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.insert(rule.id.clone(), rule);
        self
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the ruleset's identity or formats intersect `identifiers`
    pub fn applies_to(&self, identifiers: &[String]) -> bool {
        identifiers
            .iter()
            .any(|id| *id == self.uri || self.formats.contains(id))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, RulesetLoadError> {
        Self::parse_yaml(content, "<string>")
    }

    pub fn from_json_str(content: &str) -> Result<Self, RulesetLoadError> {
        Self::parse_json(content, "<string>")
    }

    /// Load a ruleset file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self, RulesetLoadError> {
        let content = std::fs::read_to_string(path)?;
        let file = path.display().to_string();

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => Self::parse_yaml(&content, &file),
            "json" => Self::parse_json(&content, &file),
            _ => Err(RulesetLoadError::Parse {
                file,
                message: format!("Unknown ruleset file format: {}", ext),
            }),
        }
    }

    /// Load every `.yaml`/`.yml`/`.json` file in `dir`, sorted by file name
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>, RulesetLoadError> {
        let mut paths = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "yaml" && ext != "yml" && ext != "json" {
                continue;
            }
            paths.push(path);
        }

        paths.sort();
        paths.iter().map(|path| Self::load(path)).collect()
    }

    fn parse_yaml(content: &str, file: &str) -> Result<Self, RulesetLoadError> {
        let ruleset: Self = serde_yaml::from_str(content).map_err(|e| RulesetLoadError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        ruleset.normalized()
    }

    fn parse_json(content: &str, file: &str) -> Result<Self, RulesetLoadError> {
        let ruleset: Self = serde_json::from_str(content).map_err(|e| RulesetLoadError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        ruleset.normalized()
    }

    /// Fill rule IDs from their keys, inherit the documentation URL and
    /// check the structure every rule needs
    fn normalized(mut self) -> Result<Self, RulesetLoadError> {
        let invalid = |uri: &str, message: String| RulesetLoadError::Invalid {
            uri: uri.to_string(),
            message,
        };

        if self.uri.trim().is_empty() {
            return Err(invalid("<unnamed>", "\"uri\" must not be empty".to_string()));
        }

        for (id, rule) in self.rules.iter_mut() {
            rule.id = id.clone();
            if rule.documentation_url.is_none() {
                rule.documentation_url = self.documentation_url.clone();
            }

            if rule.given.is_empty() || rule.selectors().iter().any(|s| s.trim().is_empty()) {
                return Err(invalid(
                    &self.uri,
                    format!("rule '{}' needs a non-empty \"given\"", id),
                ));
            }
            if rule.then.is_empty() || rule.assertions().iter().any(|a| a.function.is_empty()) {
                return Err(invalid(
                    &self.uri,
                    format!("rule '{}' needs a \"then\" naming a function", id),
                ));
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::rule::Assertion;
    use std::io::Write;
    use tempfile::TempDir;

    const YAML: &str = r#"
uri: https://example.com/rules
documentationUrl: https://example.com/docs
formats: [oas3_0]
rules:
  info-version:
    severity: error
    given: $.info
    then:
      function: schema
      functionOptions:
        schema: { required: [version] }
    message: "Missing `info.version` field."
  semver:
    given: $.info.version
    then: { function: pattern, functionOptions: { match: "^\\d+\\.\\d+\\.\\d+$" } }
    documentationUrl: https://example.com/semver
"#;

    #[test]
    fn test_from_yaml_normalizes() {
        let ruleset = Ruleset::from_yaml_str(YAML).unwrap();
        assert_eq!(ruleset.len(), 2);

        let ids: Vec<&str> = ruleset.rules.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["info-version", "semver"]);

        let info = ruleset.rule("info-version").unwrap();
        assert_eq!(info.id, "info-version");
        assert_eq!(info.severity, Severity::Error);
        assert_eq!(info.documentation_url.as_deref(), Some("https://example.com/docs"));

        let semver = ruleset.rule("semver").unwrap();
        assert_eq!(semver.documentation_url.as_deref(), Some("https://example.com/semver"));
    }

    #[test]
    fn test_applies_to() {
        let ruleset = Ruleset::from_yaml_str(YAML).unwrap();
        assert!(ruleset.applies_to(&["oas3_0".to_string()]));
        assert!(ruleset.applies_to(&["https://example.com/rules".to_string()]));
        assert!(!ruleset.applies_to(&["oas2".to_string()]));
        assert!(!ruleset.applies_to(&[]));
    }

    #[test]
    fn test_invalid_rulesets() {
        let err = Ruleset::from_yaml_str("uri: ''\nrules: {}").unwrap_err();
        assert!(matches!(err, RulesetLoadError::Invalid { .. }));

        let err = Ruleset::from_yaml_str("uri: x\nrules:\n  r:\n    given: []\n    then: {function: truthy}")
            .unwrap_err();
        assert!(err.to_string().contains("rule 'r'"));

        let err = Ruleset::from_yaml_str("uri: x\nrules: [").unwrap_err();
        assert!(matches!(err, RulesetLoadError::Parse { .. }));
    }

    #[test]
    fn test_json_and_builder() {
        let ruleset = Ruleset::from_json_str(
            r#"{"uri": "u", "rules": {"r": {"given": "$", "then": {"function": "truthy"}}}}"#,
        )
        .unwrap();
        assert_eq!(ruleset.rule("r").unwrap().id, "r");

        let built = Ruleset::new("u")
            .with_format("oas3")
            .with_rule(Rule::new("a", "$", Assertion::new("truthy")))
            .with_rule(Rule::new("a", "$.info", Assertion::new("truthy")));
        assert_eq!(built.len(), 1);
        assert_eq!(built.rule("a").unwrap().selectors(), &["$.info"]);
    }

    #[test]
    fn test_load_dir_sorted() {
        let dir = TempDir::new().unwrap();
        for (name, uri) in [("b.yaml", "second"), ("a.json", "first")] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            if name.ends_with(".json") {
                write!(file, r#"{{"uri": "{}"}}"#, uri).unwrap();
            } else {
                writeln!(file, "uri: {}", uri).unwrap();
            }
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rulesets = Ruleset::load_dir(dir.path()).unwrap();
        let uris: Vec<&str> = rulesets.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, vec!["first", "second"]);
    }
}
