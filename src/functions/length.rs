//! `length`: bounds on string length, array size or object key count

use super::{
    display_value, parse_options, AssertionResult, FunctionError, FunctionInput, PreparedFunction,
    RuleFunction,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "length";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LengthOptions {
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
}

fn load(options: &Value) -> Result<LengthOptions, FunctionError> {
    let options: LengthOptions = parse_options(NAME, options)?;
    match (options.min, options.max) {
        (None, None) => Err(FunctionError::invalid_options(
            NAME,
            "at least one of \"min\" or \"max\" is required",
        )),
        (Some(min), Some(max)) if min > max => Err(FunctionError::invalid_options(
            NAME,
            "\"min\" must not exceed \"max\"",
        )),
        _ => Ok(options),
    }
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        // Numbers are measured by their value
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as usize),
        _ => None,
    }
}

pub struct LengthFunction;

impl RuleFunction for LengthFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(load(options)?))
    }
}

impl PreparedFunction for LengthOptions {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let Some(value) = input.value else {
            return Ok(AssertionResult::pass());
        };
        let Some(length) = measure(value) else {
            return Ok(AssertionResult::pass());
        };

        let error = match (self.min, self.max) {
            (Some(min), _) if length < min => Some(format!("must be longer than {}", min)),
            (_, Some(max)) if length > max => Some(format!("must be shorter than {}", max)),
            _ => None,
        };

        Ok(match error {
            None => AssertionResult::pass(),
            Some(error) => AssertionResult::fail(error)
                .with_detail("value", display_value(value))
                .with_detail("property", input.property()),
        })
    }
}
