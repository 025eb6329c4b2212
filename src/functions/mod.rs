//! Validator functions and their registry
//!
//! A rule's `then` clause names a function; the registry maps that name to
//! an implementation of [`RuleFunction`]. The registry is an explicit value
//! handed to the [`Engine`](crate::engine::Engine) at construction, so tests
//! can build isolated registries with fake functions. Once shared behind an
//! `Arc` it can no longer be mutated.

mod casing;
mod enumeration;
mod length;
mod or;
mod pattern;
mod schema;
mod truthy;

pub use casing::{CasingFunction, CasingType};
pub use enumeration::EnumerationFunction;
pub use length::LengthFunction;
pub use or::OrFunction;
pub use pattern::PatternFunction;
pub use schema::SchemaFunction;
pub use truthy::{DefinedFunction, FalsyFunction, TruthyFunction, UndefinedFunction};

use crate::document::{JsonPath, PathSegment};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Configuration error raised by a function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    #[error("Unknown function: {0}")]
    Unknown(String),

    #[error("Invalid options for function '{function}': {message}")]
    InvalidOptions { function: String, message: String },

    #[error("Invalid regular expression for function '{function}': {message}")]
    InvalidRegex { function: String, message: String },
}

impl FunctionError {
    pub fn invalid_options(function: &str, message: impl Into<String>) -> Self {
        FunctionError::InvalidOptions {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_regex(function: &str, err: &regex::Error) -> Self {
        FunctionError::InvalidRegex {
            function: function.to_string(),
            message: err.to_string(),
        }
    }
}

/// What a function is applied to
#[derive(Debug, Clone, Copy)]
pub struct FunctionInput<'a> {
    /// Resolved target; `None` when the targeted field is absent
    pub value: Option<&'a Value>,
    /// Key of the selector match
    pub key: Option<&'a PathSegment>,
    /// Location of the target
    pub path: &'a JsonPath,
    /// Field name from the assertion, if any
    pub field: Option<&'a str>,
}

impl<'a> FunctionInput<'a> {
    pub fn new(value: Option<&'a Value>, path: &'a JsonPath) -> Self {
        Self {
            value,
            key: None,
            path,
            field: None,
        }
    }

    pub fn with_key(mut self, key: Option<&'a PathSegment>) -> Self {
        self.key = key;
        self
    }

    pub fn with_field(mut self, field: Option<&'a str>) -> Self {
        self.field = field;
        self
    }

    /// Name to report as `{{property}}`: the field, else the matched key
    pub fn property(&self) -> String {
        match (self.field, self.key) {
            (Some(field), _) if field != "@key" => field.to_string(),
            (_, Some(key)) => key.as_key(),
            _ => String::new(),
        }
    }
}

/// Outcome of one function invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionResult {
    pub ok: bool,
    /// Message placeholders (`value`, `property`, `path`, `error`, ...)
    pub detail: BTreeMap<String, String>,
}

impl AssertionResult {
    pub fn pass() -> Self {
        Self {
            ok: true,
            detail: BTreeMap::new(),
        }
    }

    /// Failure with an `error` detail
    pub fn fail(error: impl Into<String>) -> Self {
        let mut detail = BTreeMap::new();
        detail.insert("error".to_string(), error.into());
        Self { ok: false, detail }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }
}

/// A function bound to one rule's options, compiled once and then called
/// for every match of that rule
pub trait PreparedFunction: Send + Sync {
    /// Must be pure: same input, same result
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError>;
}

/// A validator function
pub trait RuleFunction: Send + Sync {
    /// Name rules refer to it by
    fn name(&self) -> &str;

    /// Check `functionOptions` and compile them (regexes, schemas) before
    /// any evaluation takes place
    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError>;
}

type CallFn = dyn Fn(&FunctionInput<'_>, &Value) -> Result<AssertionResult, FunctionError>
    + Send
    + Sync;

/// Adapter registering a closure as a function
struct ClosureFunction {
    name: String,
    call: Arc<CallFn>,
}

/// A closure with the options it was prepared with
struct PreparedClosure {
    call: Arc<CallFn>,
    options: Value,
}

impl PreparedFunction for PreparedClosure {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        (self.call)(input, &self.options)
    }
}

impl RuleFunction for ClosureFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(PreparedClosure {
            call: Arc::clone(&self.call),
            options: options.clone(),
        }))
    }
}

/// Name -> function lookup
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn RuleFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in function
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PatternFunction));
        registry.register(Arc::new(SchemaFunction));
        registry.register(Arc::new(CasingFunction));
        registry.register(Arc::new(OrFunction));
        registry.register(Arc::new(TruthyFunction));
        registry.register(Arc::new(FalsyFunction));
        registry.register(Arc::new(DefinedFunction));
        registry.register(Arc::new(UndefinedFunction));
        registry.register(Arc::new(EnumerationFunction));
        registry.register(Arc::new(LengthFunction));
        registry
    }

    /// Register a function, replacing any previous one of the same name
    pub fn register(&mut self, function: Arc<dyn RuleFunction>) -> Option<Arc<dyn RuleFunction>> {
        self.functions.insert(function.name().to_string(), function)
    }

    /// Register a closure under `name`
    pub fn register_fn<F>(&mut self, name: &str, call: F) -> Option<Arc<dyn RuleFunction>>
    where
        F: Fn(&FunctionInput<'_>, &Value) -> Result<AssertionResult, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Arc::new(ClosureFunction {
            name: name.to_string(),
            call: Arc::new(call),
        }))
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn RuleFunction>, FunctionError> {
        self.functions
            .get(name)
            .ok_or_else(|| FunctionError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Resolve `name` and compile `options` for it
    pub fn prepare(
        &self,
        name: &str,
        options: &Value,
    ) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        self.get(name)?.prepare(options)
    }

    /// Resolve `name` and validate `options` against it
    pub fn validate(&self, name: &str, options: &Value) -> Result<(), FunctionError> {
        self.prepare(name, options).map(|_| ())
    }

    /// Prepare and invoke a function by name, for one-off calls
    pub fn invoke(
        &self,
        name: &str,
        options: &Value,
        input: &FunctionInput<'_>,
    ) -> Result<AssertionResult, FunctionError> {
        self.prepare(name, options)?.call(input)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Deserialize `functionOptions`, treating an absent block as defaults
pub(crate) fn parse_options<T>(function: &str, options: &Value) -> Result<T, FunctionError>
where
    T: DeserializeOwned + Default,
{
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| FunctionError::invalid_options(function, e.to_string()))
}

/// Render a value for messages: strings bare, everything else as JSON
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Scalars a string-testing function may look at
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
