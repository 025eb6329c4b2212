//! Ruleset resolution
//!
//! Picks the registered rulesets that apply to a document and merges them
//! into one effective rule set. Rulesets are merged in registration order;
//! a later rule with the same ID replaces the earlier one entirely.

use crate::catalogue;
use crate::document::Document;
use crate::rule::Rule;
use crate::ruleset::{Ruleset, RulesetLoadError};
use indexmap::IndexMap;
use log::debug;
use std::path::Path;
use thiserror::Error;

/// No ruleset could be resolved for a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("No registered ruleset matches the document (declared: [{}])", .identifiers.join(", "))]
    NoMatchingRuleset { identifiers: Vec<String> },
}

/// The merged rule set a document is linted against
#[derive(Debug, Clone, Default)]
pub struct EffectiveRuleset {
    /// URIs of the contributing rulesets, in merge order
    pub sources: Vec<String>,
    /// Rules by ID
    pub rules: IndexMap<String, Rule>,
}

impl EffectiveRuleset {
    /// Merge `ruleset` on top of the current rules
    pub fn merge(&mut self, ruleset: &Ruleset) {
        self.sources.push(ruleset.uri.clone());
        for (id, rule) in &ruleset.rules {
            if self.rules.insert(id.clone(), rule.clone()).is_some() {
                debug!("Rule '{}' overridden by {}", id, ruleset.uri);
            }
        }
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
}

impl From<Ruleset> for EffectiveRuleset {
    fn from(ruleset: Ruleset) -> Self {
        let mut effective = Self::default();
        effective.merge(&ruleset);
        effective
    }
}

/// Registered rulesets, in registration order
#[derive(Debug, Clone, Default)]
pub struct RulesetRegistry {
    rulesets: Vec<Ruleset>,
}

impl RulesetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled catalogues
    pub fn with_builtin() -> Result<Self, RulesetLoadError> {
        let mut registry = Self::new();
        for ruleset in catalogue::builtin_rulesets()? {
            registry.register(ruleset);
        }
        Ok(registry)
    }

    pub fn register(&mut self, ruleset: Ruleset) {
        debug!("Registered ruleset {} ({} rules)", ruleset.uri, ruleset.len());
        self.rulesets.push(ruleset);
    }

    /// Load and register a ruleset file
    pub fn register_file(&mut self, path: &Path) -> Result<(), RulesetLoadError> {
        let ruleset = Ruleset::load(path)?;
        self.register(ruleset);
        Ok(())
    }

    /// Load and register every ruleset file in a directory
    pub fn register_dir(&mut self, dir: &Path) -> Result<usize, RulesetLoadError> {
        let rulesets = Ruleset::load_dir(dir)?;
        let count = rulesets.len();
        for ruleset in rulesets {
            self.register(ruleset);
        }
        Ok(count)
    }

    pub fn rulesets(&self) -> &[Ruleset] {
        &self.rulesets
    }

    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }

    /// Resolve against the identifiers a document declares
    pub fn resolve(&self, document: &Document) -> Result<EffectiveRuleset, ResolutionError> {
        self.resolve_identifiers(&document.declared_identifiers())
    }

    /// Merge every ruleset whose URI or formats intersect `identifiers`
    pub fn resolve_identifiers(
        &self,
        identifiers: &[String],
    ) -> Result<EffectiveRuleset, ResolutionError> {
        let mut effective = EffectiveRuleset::default();

        for ruleset in self.rulesets.iter().filter(|r| r.applies_to(identifiers)) {
            effective.merge(ruleset);
        }

        if effective.sources.is_empty() {
            return Err(ResolutionError::NoMatchingRuleset {
                identifiers: identifiers.to_vec(),
            });
        }

        debug!(
            "Resolved {} rules from {} ruleset(s) for [{}]",
            effective.len(),
            effective.sources.len(),
            identifiers.join(", ")
        );
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::rule::Assertion;
    use serde_json::json;

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule::new(id, "$.info", Assertion::new("truthy").with_field("title")).with_severity(severity)
    }

    #[test]
    fn test_later_ruleset_replaces_whole_rule() {
        let a = Ruleset::new("a")
            .with_format("oas3")
            .with_rule(rule("X", Severity::Error).with_message("from a"))
            .with_rule(rule("Y", Severity::Info));
        let b = Ruleset::new("b")
            .with_format("oas3")
            .with_rule(rule("X", Severity::Warn));

        let mut registry = RulesetRegistry::new();
        registry.register(a);
        registry.register(b);

        let effective = registry.resolve_identifiers(&["oas3".to_string()]).unwrap();
        assert_eq!(effective.sources, vec!["a", "b"]);
        assert_eq!(effective.len(), 2);

        let x = effective.rule("X").unwrap();
        assert_eq!(x.severity, Severity::Warn);
        // No field-level merge: the message from `a` is gone
        assert_eq!(x.message, None);
    }

    #[test]
    fn test_resolution_by_uri_or_format() {
        let mut registry = RulesetRegistry::new();
        registry.register(Ruleset::new("https://example.com/one").with_rule(rule("one", Severity::Error)));
        registry.register(Ruleset::new("two").with_format("oas2").with_rule(rule("two", Severity::Error)));

        let document = Document::new(json!({"swagger": "2.0"})).with_profile("https://example.com/one");
        let effective = registry.resolve(&document).unwrap();
        assert_eq!(effective.sources, vec!["https://example.com/one", "two"]);

        let document = Document::new(json!({"openapi": "3.0.3"}));
        assert!(registry.resolve(&document).is_err());
    }

    #[test]
    fn test_no_match_is_an_error() {
        let registry = RulesetRegistry::new();
        let err = registry
            .resolve(&Document::new(json!({"openapi": "3.1.0"})))
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::NoMatchingRuleset {
                identifiers: vec!["oas3".to_string(), "oas3_1".to_string()],
            }
        );
        assert!(err.to_string().contains("oas3, oas3_1"));
    }

    #[test]
    fn test_builtin_registry() {
        let registry = RulesetRegistry::with_builtin().unwrap();
        assert_eq!(registry.len(), 2);

        let core = registry.resolve_identifiers(&[catalogue::ADR_URI.to_string()]).unwrap();
        assert_eq!(core.sources, vec![catalogue::ADR_URI]);
        // The core catalogue is not shadowed by features-core
        assert_eq!(
            core.rule("paths-no-trailing-slash").unwrap().assertions()[0].function_options,
            json!({"notMatch": ".+\\/$"})
        );

        let effective = registry
            .resolve_identifiers(&[catalogue::ADR_20_URI.to_string()])
            .unwrap();
        assert_eq!(effective.sources, vec![catalogue::ADR_20_URI]);
        assert!(effective.rule("semver").is_some());
        assert!(effective.rule("servers-use-https").is_none());
    }

    #[test]
    fn test_register_file_and_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "uri: https://example.com/a\nformats: [oas3]\nrules:\n  a-rule:\n    given: $.info\n    then: { field: title, function: truthy }\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"uri": "https://example.com/b", "formats": ["oas3"], "rules": {"a-rule": {"severity": "error", "given": "$.info", "then": {"function": "truthy"}}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a ruleset").unwrap();

        let mut registry = RulesetRegistry::new();
        assert_eq!(registry.register_dir(dir.path()).unwrap(), 2);
        let effective = registry.resolve_identifiers(&["oas3".to_string()]).unwrap();
        assert_eq!(effective.sources, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(effective.rule("a-rule").unwrap().severity, Severity::Error);

        let mut registry = RulesetRegistry::new();
        registry.register_file(&dir.path().join("a.yaml")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.register_file(&dir.path().join("notes.txt")).is_err());
        assert!(registry.register_file(&dir.path().join("missing.yaml")).is_err());
        assert_eq!(registry.len(), 1);
    }
}
