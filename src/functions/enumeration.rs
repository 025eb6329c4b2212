//! `enumeration`: the value must be one of `values`

use super::{
    display_value, parse_options, AssertionResult, FunctionError, FunctionInput, PreparedFunction,
    RuleFunction,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "enumeration";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumerationOptions {
    #[serde(default)]
    values: Option<Vec<Value>>,
}

struct Allowed(Vec<Value>);

fn load(options: &Value) -> Result<Allowed, FunctionError> {
    let options: EnumerationOptions = parse_options(NAME, options)?;
    options
        .values
        .map(Allowed)
        .ok_or_else(|| FunctionError::invalid_options(NAME, "\"values\" is required"))
}

pub struct EnumerationFunction;

impl RuleFunction for EnumerationFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(load(options)?))
    }
}

impl PreparedFunction for Allowed {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let Allowed(values) = self;

        let Some(value) = input.value else {
            return Ok(AssertionResult::pass());
        };
        if values.contains(value) {
            return Ok(AssertionResult::pass());
        }

        let allowed: Vec<String> = values.iter().map(display_value).collect();
        Ok(AssertionResult::fail(format!(
            "\"{}\" must be equal to one of the allowed values: {}",
            display_value(value),
            allowed.join(", ")
        ))
        .with_detail("value", display_value(value))
        .with_detail("property", input.property()))
    }
}
