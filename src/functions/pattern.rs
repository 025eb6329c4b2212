//! `pattern`: the value must match `match` and/or must not match `notMatch`

use super::{
    display_value, parse_options, scalar_text, AssertionResult, FunctionError, FunctionInput,
    PreparedFunction, RuleFunction,
};
use crate::selector::compile_pattern;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "pattern";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PatternOptions {
    #[serde(default, rename = "match")]
    must_match: Option<String>,
    #[serde(default)]
    not_match: Option<String>,
}

struct Compiled {
    must_match: Option<(String, Regex)>,
    not_match: Option<(String, Regex)>,
}

fn compile(options: &Value) -> Result<Compiled, FunctionError> {
    let options: PatternOptions = parse_options(NAME, options)?;
    if options.must_match.is_none() && options.not_match.is_none() {
        return Err(FunctionError::invalid_options(
            NAME,
            "at least one of \"match\" or \"notMatch\" is required",
        ));
    }

    let build = |src: Option<String>| -> Result<Option<(String, Regex)>, FunctionError> {
        src.map(|src| {
            compile_pattern(&src)
                .map(|re| (src, re))
                .map_err(|e| FunctionError::invalid_regex(NAME, &e))
        })
        .transpose()
    };

    Ok(Compiled {
        must_match: build(options.must_match)?,
        not_match: build(options.not_match)?,
    })
}

pub struct PatternFunction;

impl RuleFunction for PatternFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(compile(options)?))
    }
}

impl PreparedFunction for Compiled {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        // Absence is `truthy`'s concern
        let Some(value) = input.value else {
            return Ok(AssertionResult::pass());
        };
        let Some(text) = scalar_text(value) else {
            return Ok(AssertionResult::fail("must be a string")
                .with_detail("value", display_value(value))
                .with_detail("property", input.property()));
        };

        if let Some((src, re)) = &self.must_match {
            if !re.is_match(&text) {
                return Ok(
                    AssertionResult::fail(format!("must match the pattern '{}'", src))
                        .with_detail("value", text)
                        .with_detail("property", input.property()),
                );
            }
        }

        if let Some((src, re)) = &self.not_match {
            if re.is_match(&text) {
                return Ok(
                    AssertionResult::fail(format!("must not match the pattern '{}'", src))
                        .with_detail("value", text)
                        .with_detail("property", input.property()),
                );
            }
        }

        Ok(AssertionResult::pass())
    }
}
