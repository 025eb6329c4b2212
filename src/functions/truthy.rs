//! Presence checks: `truthy`, `falsy`, `defined`, `undefined`

use super::{
    display_value, AssertionResult, FunctionError, FunctionInput, PreparedFunction, RuleFunction,
};
use serde_json::Value;

/// `null`, `false`, `""`, `0` and absence are falsy
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

fn subject(input: &FunctionInput<'_>) -> String {
    let property = input.property();
    if property.is_empty() {
        "value".to_string()
    } else {
        format!("\"{}\" property", property)
    }
}

fn failure(input: &FunctionInput<'_>, expectation: &str) -> AssertionResult {
    let mut result = AssertionResult::fail(format!("{} must be {}", subject(input), expectation))
        .with_detail("property", input.property())
        .with_detail("path", input.path.to_string());
    if let Some(value) = input.value {
        result = result.with_detail("value", display_value(value));
    }
    result
}

fn reject_options(name: &str, options: &Value) -> Result<(), FunctionError> {
    match options {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        _ => Err(FunctionError::invalid_options(name, "takes no options")),
    }
}

/// The check each presence function performs once prepared
#[derive(Debug, Clone, Copy)]
enum Presence {
    Truthy,
    Falsy,
    Defined,
    Undefined,
}

impl Presence {
    fn prepare(self, name: &str, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        reject_options(name, options)?;
        Ok(Box::new(self))
    }
}

impl PreparedFunction for Presence {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let (ok, expectation) = match self {
            Presence::Truthy => (is_truthy(input.value), "truthy"),
            Presence::Falsy => (!is_truthy(input.value), "falsy"),
            Presence::Defined => (input.value.is_some(), "defined"),
            Presence::Undefined => (input.value.is_none(), "undefined"),
        };
        if ok {
            Ok(AssertionResult::pass())
        } else {
            Ok(failure(input, expectation))
        }
    }
}

/// The target must exist and be non-empty, non-false, non-zero
pub struct TruthyFunction;

impl RuleFunction for TruthyFunction {
    fn name(&self) -> &str {
        "truthy"
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Presence::Truthy.prepare(self.name(), options)
    }
}

pub struct FalsyFunction;

impl RuleFunction for FalsyFunction {
    fn name(&self) -> &str {
        "falsy"
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Presence::Falsy.prepare(self.name(), options)
    }
}

/// The target must be present; `null` counts as present
pub struct DefinedFunction;

impl RuleFunction for DefinedFunction {
    fn name(&self) -> &str {
        "defined"
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Presence::Defined.prepare(self.name(), options)
    }
}

pub struct UndefinedFunction;

impl RuleFunction for UndefinedFunction {
    fn name(&self) -> &str {
        "undefined"
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Presence::Undefined.prepare(self.name(), options)
    }
}
