//! Rule definitions in the catalogue authoring format
//!
//! ```yaml
//! include-major-version-in-uri:
//!   severity: error
//!   given: "$.servers[*]"
//!   then:
//!     field: url
//!     function: pattern
//!     functionOptions:
//!       match: "\\/v[\\d+]"
//!   message: "Include the major version number in the URI"
//! ```

use crate::diagnostic::Severity;
use crate::document::{child, PathSegment};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single item or a list of items; catalogues accept both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    fn push(&mut self, item: T) {
        let current = std::mem::replace(self, OneOrMany::Many(Vec::new()));
        let mut items = match current {
            OneOrMany::One(first) => vec![first],
            OneOrMany::Many(items) => items,
        };
        items.push(item);
        *self = OneOrMany::Many(items);
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

/// Field reference meaning "the matched key itself"
pub const KEY_FIELD: &str = "@key";

/// One `then` entry: a function applied to a field of the match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    /// Target field; absent means the matched node itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Registered function name
    pub function: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub function_options: Value,
}

impl Assertion {
    pub fn new(function: &str) -> Self {
        Self {
            field: None,
            function: function.to_string(),
            function_options: Value::Null,
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.function_options = options;
        self
    }

    /// Whether the assertion targets the matched key
    pub fn targets_key(&self) -> bool {
        self.field.as_deref() == Some(KEY_FIELD)
    }
}

/// Resolve a field relative to a matched node.
///
/// Returns the target (if present) and the path segments leading to it.
/// A field naming an existing child is taken literally, so keys such as
/// `/openapi.json` work; otherwise `a.b` walks nested children and
/// `#/a/b` is read as a JSON pointer.
pub fn resolve_field<'a>(node: &'a Value, field: &str) -> (Option<&'a Value>, Vec<PathSegment>) {
    if let Some(pointer) = field.strip_prefix("#/") {
        let segments = pointer
            .split('/')
            .map(|raw| raw.replace("~1", "/").replace("~0", "~"))
            .collect::<Vec<_>>();
        return walk(node, segments.iter().map(String::as_str));
    }

    let literal = segment_for(node, field);
    if let Some(value) = child(node, &literal) {
        return (Some(value), vec![literal]);
    }

    if field.contains('.') && !field.starts_with('/') {
        return walk(node, field.split('.'));
    }

    (None, vec![literal])
}

fn walk<'a, 'f>(
    node: &'a Value,
    names: impl Iterator<Item = &'f str>,
) -> (Option<&'a Value>, Vec<PathSegment>) {
    let mut current = Some(node);
    let mut segments = Vec::new();
    for name in names {
        let segment = match current {
            Some(value) => segment_for(value, name),
            None => PathSegment::Key(name.to_string()),
        };
        current = current.and_then(|value| child(value, &segment));
        segments.push(segment);
    }
    (current, segments)
}

/// Sequence positions are indices, everything else a key
fn segment_for(node: &Value, name: &str) -> PathSegment {
    match (node, name.parse::<usize>()) {
        (Value::Array(_), Ok(index)) => PathSegment::Index(index),
        _ => PathSegment::Key(name.to_string()),
    }
}

/// A lint rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique rule identifier; taken from the catalogue key
    #[serde(default, skip_serializing)]
    pub id: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Severity of the diagnostics this rule emits
    #[serde(default)]
    pub severity: Severity,

    /// Selector expression(s)
    pub given: OneOrMany<String>,

    /// Assertion(s), all applied to every match
    pub then: OneOrMany<Assertion>,

    /// Message template with `{{placeholder}}`s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Documentation URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    /// Accepted for compatibility with exported catalogues
    #[serde(default, skip_serializing)]
    pub resolved: Option<bool>,
}

impl Rule {
    pub fn new(id: &str, given: &str, assertion: Assertion) -> Self {
        Self {
            id: id.to_string(),
            description: None,
            severity: Severity::default(),
            given: OneOrMany::One(given.to_string()),
            then: OneOrMany::One(assertion),
            message: None,
            documentation_url: None,
            resolved: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_documentation_url(mut self, url: &str) -> Self {
        self.documentation_url = Some(url.to_string());
        self
    }

    /// Add another selector
    pub fn with_given(mut self, given: &str) -> Self {
        self.given.push(given.to_string());
        self
    }

    /// Add another assertion
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.then.push(assertion);
        self
    }

    pub fn selectors(&self) -> &[String] {
        self.given.as_slice()
    }

    pub fn assertions(&self) -> &[Assertion] {
        self.then.as_slice()
    }

    pub fn is_enabled(&self) -> bool {
        !self.severity.is_off()
    }

    /// Template used to render diagnostics
    pub fn message_template(&self) -> &str {
        self.message.as_deref().unwrap_or("{{error}}")
    }
}
