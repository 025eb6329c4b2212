//! Core lint engine
//!
//! Runs every enabled rule of an effective ruleset against a document.
//! Rules are independent of each other, so they are spread over a rayon
//! pool; the aggregator re-sorts the output, so evaluation order never
//! shows in the report. A rule whose configuration is broken is reported
//! in [`Report::rule_failures`] and the remaining rules still run.

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::document::{Document, JsonPath, PathSegment};
use crate::functions::{
    display_value, FunctionError, FunctionInput, FunctionRegistry, PreparedFunction,
};
use crate::message;
use crate::report::{aggregate, Report, RuleFailure, RuleTiming};
use crate::resolver::{EffectiveRuleset, ResolutionError, RulesetRegistry};
use crate::rule::{resolve_field, Assertion, Rule};
use crate::selector::{evaluate_all, Match, Selector, SelectorError};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a single rule could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("Skipped: run deadline exceeded")]
    DeadlineExceeded,
}

/// One value an assertion checks, with where it lives
struct Target<'m> {
    value: Option<Cow<'m, Value>>,
    path: JsonPath,
    key: Option<PathSegment>,
}

/// Outcome of one rule in a run
struct RuleOutcome {
    rule_id: String,
    result: Result<(Vec<Diagnostic>, RuleTiming), RuleError>,
}

/// The main lint engine
pub struct Engine {
    /// Configuration
    config: Config,

    /// Validator functions; shared and read-only once the engine exists
    functions: Arc<FunctionRegistry>,
}

impl Engine {
    /// Create an engine over an explicit function registry
    pub fn new(config: Config, functions: Arc<FunctionRegistry>) -> Self {
        Self { config, functions }
    }

    /// Create an engine with the built-in functions
    pub fn with_builtins(config: Config) -> Self {
        Self::new(config, Arc::new(FunctionRegistry::with_builtins()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Resolve the rulesets that apply to `document` and lint it.
    ///
    /// Fails only when no ruleset applies; problems with individual rules
    /// are recorded in the report.
    pub fn lint(
        &self,
        document: &Document,
        registry: &RulesetRegistry,
    ) -> Result<Report, ResolutionError> {
        let mut identifiers = document.declared_identifiers();
        for profile in &self.config.rulesets.profiles {
            if !identifiers.contains(profile) {
                identifiers.push(profile.clone());
            }
        }

        let ruleset = registry.resolve_identifiers(&identifiers)?;
        Ok(self.lint_ruleset(document, &ruleset))
    }

    /// Lint `document` against an already resolved ruleset
    pub fn lint_ruleset(&self, document: &Document, ruleset: &EffectiveRuleset) -> Report {
        let start = Instant::now();
        let deadline = self.config.engine.timeout().map(|timeout| start + timeout);

        // `off` rules are dropped here, before any selector is compiled
        let rules: Vec<Rule> = ruleset
            .rules
            .values()
            .filter_map(|rule| {
                let severity = self.config.effective_severity(&rule.id, rule.severity);
                if severity.is_off() {
                    debug!("Rule '{}' is off, skipping", rule.id);
                    return None;
                }
                let mut rule = rule.clone();
                rule.severity = severity;
                Some(rule)
            })
            .collect();

        let run = |rule: &Rule| self.run_rule(document, rule, deadline);

        let outcomes: Vec<RuleOutcome> = if self.config.engine.is_parallel() && rules.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.engine.thread_count())
                .build()
            {
                Ok(pool) => pool.install(|| rules.par_iter().map(run).collect()),
                Err(e) => {
                    warn!("Could not build thread pool, running sequentially: {}", e);
                    rules.iter().map(run).collect()
                }
            }
        } else {
            rules.iter().map(run).collect()
        };

        let mut diagnostics = Vec::new();
        let mut timings = Vec::new();
        let mut failures = Vec::new();
        let mut timed_out = false;

        for outcome in outcomes {
            match outcome.result {
                Ok((found, timing)) => {
                    diagnostics.extend(found);
                    timings.push(timing);
                }
                Err(err) => {
                    if err == RuleError::DeadlineExceeded {
                        timed_out = true;
                    } else {
                        warn!("Rule '{}' failed: {}", outcome.rule_id, err);
                    }
                    failures.push(RuleFailure {
                        rule_id: outcome.rule_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if timed_out {
            warn!("Run deadline exceeded; some rules were skipped");
        }

        let mut report = aggregate(document, diagnostics);
        report.rules_evaluated = timings.len();
        report.rule_timings = timings;
        report.rule_failures = failures;
        report.timed_out = timed_out;
        report.duration = start.elapsed();

        info!(
            "Linted with {} rule(s): {} error(s), {} warning(s), {} failed rule(s) in {:?}",
            report.rules_evaluated,
            report.error_count,
            report.warning_count,
            report.rule_failures.len(),
            report.duration
        );
        report
    }

    fn run_rule(&self, document: &Document, rule: &Rule, deadline: Option<Instant>) -> RuleOutcome {
        let result = if deadline.is_some_and(|d| Instant::now() >= d) {
            Err(RuleError::DeadlineExceeded)
        } else {
            self.evaluate_rule(document, rule)
        };
        RuleOutcome {
            rule_id: rule.id.clone(),
            result,
        }
    }

    /// Evaluate one rule: run its selectors, apply every assertion to
    /// every match and turn failures into diagnostics.
    ///
    /// Severity `off` yields nothing without touching the document.
    pub fn evaluate_rule(
        &self,
        document: &Document,
        rule: &Rule,
    ) -> Result<(Vec<Diagnostic>, RuleTiming), RuleError> {
        let started = Instant::now();
        let mut timing = RuleTiming::new(&rule.id);
        if rule.severity.is_off() {
            return Ok((Vec::new(), timing));
        }

        let selectors = rule
            .selectors()
            .iter()
            .map(|given| Selector::parse(given))
            .collect::<Result<Vec<_>, _>>()?;
        let prepared = rule
            .assertions()
            .iter()
            .map(|assertion| {
                self.functions
                    .prepare(&assertion.function, &assertion.function_options)
                    .map(|function| (assertion, function))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let matches = evaluate_all(document, &selectors);
        timing.selector_evaluations = selectors.len();
        timing.match_count = matches.len();
        debug!("Rule '{}': {} match(es)", rule.id, matches.len());

        let mut diagnostics = Vec::new();
        for found in &matches {
            for (assertion, function) in &prepared {
                self.apply(rule, assertion, function.as_ref(), found, &mut diagnostics)?;
            }
        }

        timing.total_time = started.elapsed();
        Ok((diagnostics, timing))
    }

    /// Values `assertion` checks for one match.
    ///
    /// `@key` on a mapping checks each of its keys at its own path, and an
    /// empty mapping yields a single absent target. On any other match it
    /// checks the key the match lives under.
    fn targets<'m>(assertion: &Assertion, found: &'m Match<'_>) -> Vec<Target<'m>> {
        let at_match = |value: Option<Cow<'m, Value>>| Target {
            value,
            path: found.path.clone(),
            key: found.key.clone(),
        };

        match assertion.field.as_deref() {
            None => vec![at_match(Some(Cow::Borrowed(found.value.as_ref())))],
            Some(_) if assertion.targets_key() => match found.value.as_ref() {
                Value::Object(map) if map.is_empty() => vec![at_match(None)],
                Value::Object(map) => map
                    .keys()
                    .map(|name| Target {
                        value: Some(Cow::Owned(Value::String(name.clone()))),
                        path: found.path.clone().key(name),
                        key: Some(PathSegment::Key(name.clone())),
                    })
                    .collect(),
                _ => vec![at_match(found.key.as_ref().map(|key| Cow::Owned(key.to_value())))],
            },
            Some(field) => {
                let (value, segments) = resolve_field(found.value.as_ref(), field);
                let mut target = at_match(value.map(Cow::Borrowed));
                for segment in segments {
                    target.path.push(segment);
                }
                vec![target]
            }
        }
    }

    /// Apply one prepared assertion to one match
    fn apply(
        &self,
        rule: &Rule,
        assertion: &Assertion,
        function: &dyn PreparedFunction,
        found: &Match<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), FunctionError> {
        for target in Self::targets(assertion, found) {
            let value = target.value.as_deref();
            let input = FunctionInput::new(value, &target.path)
                .with_key(target.key.as_ref())
                .with_field(assertion.field.as_deref());
            let result = function.call(&input)?;
            if result.ok {
                continue;
            }

            let path = target.path;
            let mut detail = result.detail;
            detail
                .entry("path".to_string())
                .or_insert_with(|| path.to_string());
            detail.entry("property".to_string()).or_insert_with(|| {
                path.last().map(|segment| segment.as_key()).unwrap_or_default()
            });
            if let Some(value) = value {
                detail
                    .entry("value".to_string())
                    .or_insert_with(|| display_value(value));
            }
            if let Some(description) = &rule.description {
                detail
                    .entry("description".to_string())
                    .or_insert_with(|| description.clone());
            }

            let mut text = message::render(rule.message_template(), &detail);
            if text.trim().is_empty() {
                text = rule.description.clone().unwrap_or_else(|| rule.id.clone());
            }

            diagnostics.push(
                Diagnostic::new(&rule.id, rule.severity, path, &text)
                    .with_documentation_url(rule.documentation_url.as_deref()),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::document::PathSegment;
    use crate::functions::AssertionResult;
    use crate::ruleset::Ruleset;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine() -> Engine {
        let mut config = Config::new();
        config.engine.parallel = Some(false);
        Engine::with_builtins(config)
    }

    fn servers_rule() -> Rule {
        Rule::new(
            "include-major-version-in-uri",
            "$.servers[*]",
            Assertion::new("pattern")
                .with_field("url")
                .with_options(json!({"match": "\\/v[\\d+]"})),
        )
        .with_severity(Severity::Error)
        .with_message("Include the major version number in the URI")
    }

    #[test]
    fn test_evaluate_rule_field_path() {
        let document = Document::new(json!({
            "servers": [{"url": "https://api.example.com"}, {"url": "https://api.example.com/v1"}]
        }));
        let (diagnostics, timing) = engine().evaluate_rule(&document, &servers_rule()).unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path.to_string(), "servers[0].url");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(timing.selector_evaluations, 1);
        assert_eq!(timing.match_count, 2);
    }

    #[test]
    fn test_message_placeholders() {
        let rule = Rule::new(
            "servers-use-https",
            "$.servers[*]",
            Assertion::new("pattern")
                .with_field("url")
                .with_options(json!({"match": "^https://.*"})),
        )
        .with_message("Server URL {{value}} {{error}}. {{unknown}}at {{path}}");
        let document = Document::new(json!({"servers": [{"url": "http://x"}]}));
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(
            diagnostics[0].message,
            "Server URL http://x must match the pattern '^https://.*'. at servers[0].url"
        );
    }

    #[test]
    fn test_message_falls_back_to_error_then_description() {
        let document = Document::new(json!({"info": {}}));
        let rule = Rule::new("t", "$.info", Assertion::new("truthy").with_field("title"));
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics[0].message, "\"title\" property must be truthy");
        assert_eq!(diagnostics[0].path.to_string(), "info.title");

        let rule = rule.with_message("{{nothing}}").with_description("Info needs a title");
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics[0].message, "Info needs a title");
    }

    #[test]
    fn test_multiple_assertions_yield_independent_diagnostics() {
        let document = Document::new(json!({"info": {"title": ""}}));
        let rule = Rule::new("info", "$.info", Assertion::new("truthy").with_field("title"))
            .with_assertion(Assertion::new("defined").with_field("version"));
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_key_assertions() {
        let document = Document::new(json!({
            "components": {"schemas": {"Pet": {}, "pet_owner": {}}}
        }));
        let rule = Rule::new(
            "schema-camel-case",
            "$.components.schemas[*]~",
            Assertion::new("casing").with_options(json!({"type": "pascal"})),
        )
        .with_message("Schema name should be CamelCase in {{path}}");
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Schema name should be CamelCase in components.schemas.pet_owner"
        );

        let rule = Rule::new(
            "no-trailing-slash",
            "$.paths",
            Assertion::new("pattern")
                .with_field("@key")
                .with_options(json!({"notMatch": ".+\\/$"})),
        )
        .with_message("{{property}}: Leave off trailing slashes");
        let document = Document::new(json!({"paths": {"/pets": {}, "/pets/": {}, "/owners/": {}}}));
        let (diagnostics, timing) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(timing.match_count, 1);
        let paths: Vec<String> = diagnostics.iter().map(|d| d.path.to_string()).collect();
        assert_eq!(paths, vec!["paths['/pets/']", "paths['/owners/']"]);
        assert_eq!(diagnostics[0].message, "/pets/: Leave off trailing slashes");
    }

    #[test]
    fn test_key_field_checks_every_property_name() {
        let document = Document::new(json!({
            "components": {"schemas": {"Pet": {"properties": {"petName": {}, "pet_owner": {}}}}}
        }));
        let rule = Rule::new(
            "property-casing",
            "$..properties",
            Assertion::new("casing")
                .with_field("@key")
                .with_options(json!({"type": "camel"})),
        )
        .with_message("Properties should be lowerCamelCase in {{path}}");
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].path.last(),
            Some(&PathSegment::Key("pet_owner".to_string()))
        );
        assert_eq!(
            diagnostics[0].message,
            "Properties should be lowerCamelCase in components.schemas.Pet.properties.pet_owner"
        );
    }

    #[test]
    fn test_key_field_on_scalar_and_empty_mapping() {
        // A scalar match is judged by the key it lives under
        let document = Document::new(json!({"info": {"Title": "x"}}));
        let rule = Rule::new(
            "lower-keys",
            "$.info[*]",
            Assertion::new("casing")
                .with_field("@key")
                .with_options(json!({"type": "flat"})),
        );
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path.to_string(), "info.Title");

        // An empty mapping has one absent target
        let document = Document::new(json!({"paths": {}}));
        let rule = Rule::new("has-paths", "$.paths", Assertion::new("truthy").with_field("@key"));
        let (diagnostics, _) = engine().evaluate_rule(&document, &rule).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path.to_string(), "paths");
    }

    #[test]
    fn test_configuration_errors() {
        let document = Document::new(json!({}));

        let rule = Rule::new("bad-selector", "servers", Assertion::new("truthy"));
        assert!(matches!(
            engine().evaluate_rule(&document, &rule),
            Err(RuleError::Selector(_))
        ));

        let rule = Rule::new("bad-function", "$", Assertion::new("nope"));
        assert_eq!(
            engine().evaluate_rule(&document, &rule).unwrap_err(),
            RuleError::Function(FunctionError::Unknown("nope".to_string()))
        );

        let rule = Rule::new("bad-options", "$", Assertion::new("pattern"));
        assert!(matches!(
            engine().evaluate_rule(&document, &rule),
            Err(RuleError::Function(FunctionError::InvalidOptions { .. }))
        ));
    }

    #[test]
    fn test_fake_function_registry() {
        let mut functions = FunctionRegistry::new();
        functions.register_fn("always-fails", |_, _| Ok(AssertionResult::fail("nope")));
        let engine = Engine::new(Config::new(), Arc::new(functions));

        let ruleset = Ruleset::new("u")
            .with_rule(Rule::new("a", "$.x", Assertion::new("always-fails")))
            .with_rule(Rule::new("b", "$.x", Assertion::new("truthy")));
        let document = Document::new(json!({"x": 1}));
        let report = engine.lint_ruleset(&document, &EffectiveRuleset::from(ruleset));

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.rule_failures.len(), 1);
        assert_eq!(report.rule_failures[0].rule_id, "b");
        assert_eq!(report.diagnostics[0].severity, Severity::Warn);
    }

    #[test]
    fn test_deadline_skips_rules() {
        let mut config = Config::new();
        config.engine.timeout_ms = Some(0);
        let engine = Engine::with_builtins(config);

        let ruleset = Ruleset::new("u").with_rule(servers_rule());
        let document = Document::new(json!({"servers": [{"url": "x"}]}));
        let report = engine.lint_ruleset(&document, &EffectiveRuleset::from(ruleset));

        assert!(report.timed_out);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.rule_failures[0].reason, "Skipped: run deadline exceeded");
    }

    #[test]
    fn test_severity_override_and_disable() {
        let mut config = Config::new();
        config
            .rules
            .severity
            .insert("include-major-version-in-uri".to_string(), Severity::Info);
        let engine = Engine::with_builtins(config);

        let ruleset = EffectiveRuleset::from(Ruleset::new("u").with_rule(servers_rule()));
        let document = Document::new(json!({"servers": [{"url": "x"}]}));
        let report = engine.lint_ruleset(&document, &ruleset);
        assert_eq!(report.diagnostics[0].severity, Severity::Info);
        assert!(!report.has_errors);

        let mut config = Config::new();
        config.rules.disabled.push("include-major-version-in-uri".to_string());
        let report = Engine::with_builtins(config).lint_ruleset(&document, &ruleset);
        assert!(report.diagnostics.is_empty());
        assert!(report.timing("include-major-version-in-uri").is_none());
    }
}
