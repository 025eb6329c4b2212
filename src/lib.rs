//! adr-lint - rule engine for API Design Rules
//!
//! Lints OpenAPI documents against declarative rule catalogues such as the
//! NLGov REST API Design Rules.
//!
//! # Architecture
//!
//! ```text
//! RulesetRegistry -> EffectiveRuleset -> Engine (Selector + FunctionRegistry) -> Report
//! ```
//!
//! The registry resolves which rulesets apply to a document and merges
//! them; the engine runs each rule's selectors, applies the rule's
//! functions to every match and aggregates the failures into a report.
//!
//! # Writing rules
//!
//! ```yaml
//! uri: https://example.com/my-rules
//! formats: [oas3]
//! rules:
//!   servers-use-https:
//!     severity: warn
//!     given: "$.servers[*]"
//!     then:
//!       field: url
//!       function: pattern
//!       functionOptions:
//!         match: "^https://"
//!     message: "Server URL {{value}} {{error}}."
//! ```

pub mod catalogue;
pub mod config;
pub mod diagnostic;
pub mod document;
pub mod engine;
pub mod functions;
pub mod message;
pub mod report;
pub mod resolver;
pub mod rule;
pub mod ruleset;
pub mod selector;

// Re-export main types
pub use config::{Config, ConfigError};
pub use diagnostic::{Diagnostic, Severity};
pub use document::{Document, DocumentError, JsonPath, PathSegment};
pub use engine::{Engine, RuleError};
pub use functions::{
    AssertionResult, FunctionError, FunctionInput, FunctionRegistry, PreparedFunction, RuleFunction,
};
pub use report::{aggregate, Report, RuleFailure, RuleTiming};
pub use resolver::{EffectiveRuleset, ResolutionError, RulesetRegistry};
pub use rule::{Assertion, OneOrMany, Rule};
pub use ruleset::{Ruleset, RulesetLoadError};
pub use selector::{Match, Selector, SelectorError};
