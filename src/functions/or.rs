//! `or`: at least one of the listed properties must be a key of the target

use super::{
    parse_options, AssertionResult, FunctionError, FunctionInput, PreparedFunction, RuleFunction,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "or";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrOptions {
    #[serde(default)]
    properties: Vec<String>,
}

/// Accepted property names, in the order the rule lists them
struct Alternatives(Vec<String>);

fn load(options: &Value) -> Result<Alternatives, FunctionError> {
    let options: OrOptions = parse_options(NAME, options)?;
    if options.properties.is_empty() {
        return Err(FunctionError::invalid_options(
            NAME,
            "\"properties\" must list at least one property",
        ));
    }
    Ok(Alternatives(options.properties))
}

pub struct OrFunction;

impl RuleFunction for OrFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(load(options)?))
    }
}

impl PreparedFunction for Alternatives {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let Alternatives(properties) = self;

        if let Some(Value::Object(map)) = input.value {
            if properties.iter().any(|name| map.contains_key(name)) {
                return Ok(AssertionResult::pass());
            }
        }

        let listed = properties
            .iter()
            .map(|name| format!("\"{}\"", name))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(
            AssertionResult::fail(format!("at least one of {} must be defined", listed))
                .with_detail("property", properties.join(", "))
                .with_detail("path", input.path.to_string()),
        )
    }
}
