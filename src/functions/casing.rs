//! `casing`: the key or string value must follow a naming style

use super::{
    display_value, parse_options, AssertionResult, FunctionError, FunctionInput, PreparedFunction,
    RuleFunction,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "casing";

/// Supported naming styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasingType {
    /// `flatcase`
    Flat,
    /// `camelCase`
    Camel,
    /// `PascalCase`
    Pascal,
    /// `kebab-case`
    Kebab,
    /// `COBOL-CASE`
    Cobol,
    /// `snake_case`
    Snake,
    /// `MACRO_CASE`
    Macro,
}

impl CasingType {
    fn as_str(&self) -> &'static str {
        match self {
            CasingType::Flat => "flat",
            CasingType::Camel => "camel",
            CasingType::Pascal => "pascal",
            CasingType::Kebab => "kebab",
            CasingType::Cobol => "cobol",
            CasingType::Snake => "snake",
            CasingType::Macro => "macro",
        }
    }

    /// Unanchored pattern for one word group
    fn pattern(&self, digits: &str) -> String {
        let d = digits;
        match self {
            CasingType::Flat => format!("[a-z][a-z{d}]*"),
            CasingType::Camel => format!("[a-z][a-z{d}]*(?:[A-Z{d}](?:[a-z{d}]+|$))*"),
            CasingType::Pascal => format!("[A-Z][a-z{d}]*(?:[A-Z{d}](?:[a-z{d}]+|$))*"),
            CasingType::Kebab => format!("[a-z][a-z{d}]*(?:-[a-z{d}]+)*"),
            CasingType::Cobol => format!("[A-Z][A-Z{d}]*(?:-[A-Z{d}]+)*"),
            CasingType::Snake => format!("[a-z][a-z{d}]*(?:_[a-z{d}]+)*"),
            CasingType::Macro => format!("[A-Z][A-Z{d}]*(?:_[A-Z{d}]+)*"),
        }
    }
}

impl std::fmt::Display for CasingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Separator {
    #[serde(default)]
    char: String,
    #[serde(default)]
    allow_leading: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CasingOptions {
    #[serde(default, rename = "type")]
    kind: Option<CasingType>,
    #[serde(default)]
    disallow_digits: bool,
    #[serde(default)]
    separator: Option<Separator>,
}

struct Compiled {
    kind: CasingType,
    regex: Regex,
    leading_separator: Option<String>,
}

fn compile(options: &Value) -> Result<Compiled, FunctionError> {
    let options: CasingOptions = parse_options(NAME, options)?;
    let kind = options
        .kind
        .ok_or_else(|| FunctionError::invalid_options(NAME, "\"type\" is required"))?;

    let digits = if options.disallow_digits { "" } else { "0-9" };
    let word = kind.pattern(digits);

    let separator = options.separator.filter(|s| !s.char.is_empty());
    if let Some(separator) = &separator {
        if separator.char.chars().count() != 1 {
            return Err(FunctionError::invalid_options(
                NAME,
                "\"separator.char\" must be a single character",
            ));
        }
    }

    let source = match &separator {
        None => format!("^(?:{word})$"),
        Some(separator) => {
            let sep = regex::escape(&separator.char);
            let leading = if separator.allow_leading {
                format!("{sep}?")
            } else {
                String::new()
            };
            format!("^{leading}(?:{word})(?:{sep}(?:{word}))*$")
        }
    };

    let regex = Regex::new(&source).map_err(|e| FunctionError::invalid_regex(NAME, &e))?;
    Ok(Compiled {
        kind,
        regex,
        leading_separator: separator
            .filter(|s| s.allow_leading)
            .map(|s| s.char),
    })
}

pub struct CasingFunction;

impl RuleFunction for CasingFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(compile(options)?))
    }
}

impl PreparedFunction for Compiled {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let Some(value) = input.value else {
            return Ok(AssertionResult::pass());
        };
        let Value::String(text) = value else {
            return Ok(AssertionResult::fail("must be a string")
                .with_detail("property", input.property())
                .with_detail("path", input.path.to_string())
                .with_detail("value", display_value(value)));
        };

        if text.is_empty() || self.leading_separator.as_deref() == Some(text.as_str()) {
            return Ok(AssertionResult::pass());
        }

        if self.regex.is_match(text) {
            return Ok(AssertionResult::pass());
        }

        Ok(
            AssertionResult::fail(format!("must be {} case", self.kind))
                .with_detail("property", input.property())
                .with_detail("path", input.path.to_string())
                .with_detail("value", text.clone()),
        )
    }
}
