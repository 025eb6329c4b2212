//! `schema`: structural constraints on the target
//!
//! Supports the subset of JSON Schema that rule catalogues rely on:
//! `type`, `enum`, `required`, `properties`, `allOf`, `anyOf`, `oneOf`.
//! Unknown keywords are rejected so a rule never silently checks less than
//! it claims to.

use super::{
    display_value, parse_options, AssertionResult, FunctionError, FunctionInput, PreparedFunction,
    RuleFunction,
};
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "schema";

const TYPES: &[&str] = &["object", "array", "string", "number", "integer", "boolean", "null"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaOptions {
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default, rename = "dialect")]
    _dialect: Option<IgnoredAny>,
    #[serde(default, rename = "allErrors")]
    _all_errors: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeSet {
    One(String),
    Many(Vec<String>),
}

impl TypeSet {
    fn names(&self) -> Vec<&str> {
        match self {
            TypeSet::One(name) => vec![name.as_str()],
            TypeSet::Many(names) => names.iter().map(|s| s.as_str()).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Schema {
    #[serde(default, rename = "type")]
    kind: Option<TypeSet>,
    #[serde(default, rename = "enum")]
    allowed: Option<Vec<Value>>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    properties: IndexMap<String, Schema>,
    #[serde(default)]
    all_of: Vec<Schema>,
    #[serde(default)]
    any_of: Vec<Schema>,
    #[serde(default)]
    one_of: Vec<Schema>,
    #[serde(default, rename = "$schema")]
    _dialect: Option<IgnoredAny>,
    #[serde(default, rename = "title")]
    _title: Option<IgnoredAny>,
    #[serde(default, rename = "description")]
    _description: Option<IgnoredAny>,
}

impl Schema {
    fn check_types(&self) -> Result<(), String> {
        if let Some(kind) = &self.kind {
            for name in kind.names() {
                if !TYPES.contains(&name) {
                    return Err(format!("unknown type \"{}\"", name));
                }
            }
        }
        self.properties
            .values()
            .chain(&self.all_of)
            .chain(&self.any_of)
            .chain(&self.one_of)
            .try_for_each(Schema::check_types)
    }

    /// Human summary of an alternative, used in `anyOf`/`oneOf` failures
    fn summary(&self, index: usize) -> String {
        if !self.required.is_empty() && self.kind.is_none() && self.properties.is_empty() {
            format!("[{}]", self.required.join(", "))
        } else {
            format!("schema #{}", index + 1)
        }
    }
}

/// First violation found
struct Violation {
    error: String,
    property: String,
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn quote_list(names: &[&String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check(schema: &Schema, value: &Value, prefix: &str) -> Option<Violation> {
    let property = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    if let Some(kind) = &schema.kind {
        let names = kind.names();
        if !names.iter().any(|name| type_matches(name, value)) {
            return Some(Violation {
                error: format!("must be {}", names.join(" or ")),
                property: prefix.to_string(),
            });
        }
    }

    if let Some(allowed) = &schema.allowed {
        if !allowed.contains(value) {
            let list: Vec<String> = allowed.iter().map(display_value).collect();
            return Some(Violation {
                error: format!("must be equal to one of the allowed values: {}", list.join(", ")),
                property: prefix.to_string(),
            });
        }
    }

    if let Value::Object(map) = value {
        let missing: Vec<&String> = schema
            .required
            .iter()
            .filter(|name| !map.contains_key(name.as_str()))
            .collect();
        if !missing.is_empty() {
            let error = if missing.len() == 1 {
                format!("must have required property {}", quote_list(&missing))
            } else {
                format!("must have required properties {}", quote_list(&missing))
            };
            return Some(Violation {
                error,
                property: missing
                    .iter()
                    .map(|name| property(name.as_str()))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        for (name, sub) in &schema.properties {
            if let Some(child) = map.get(name) {
                if let Some(violation) = check(sub, child, &property(name.as_str())) {
                    return Some(violation);
                }
            }
        }
    }

    for sub in &schema.all_of {
        if let Some(violation) = check(sub, value, prefix) {
            return Some(violation);
        }
    }

    if !schema.any_of.is_empty() && schema.any_of.iter().all(|sub| check(sub, value, prefix).is_some()) {
        let alternatives: Vec<String> = schema
            .any_of
            .iter()
            .enumerate()
            .map(|(i, sub)| sub.summary(i))
            .collect();
        return Some(Violation {
            error: format!("must match at least one of: {}", alternatives.join(" or ")),
            property: prefix.to_string(),
        });
    }

    if !schema.one_of.is_empty() {
        let passing = schema
            .one_of
            .iter()
            .filter(|sub| check(sub, value, prefix).is_none())
            .count();
        if passing != 1 {
            let alternatives: Vec<String> = schema
                .one_of
                .iter()
                .enumerate()
                .map(|(i, sub)| sub.summary(i))
                .collect();
            return Some(Violation {
                error: format!(
                    "must match exactly one of: {} ({} matched)",
                    alternatives.join(" or "),
                    passing
                ),
                property: prefix.to_string(),
            });
        }
    }

    None
}

fn load(options: &Value) -> Result<Schema, FunctionError> {
    let options: SchemaOptions = parse_options(NAME, options)?;
    let schema = options
        .schema
        .ok_or_else(|| FunctionError::invalid_options(NAME, "\"schema\" is required"))?;
    schema
        .check_types()
        .map_err(|message| FunctionError::invalid_options(NAME, message))?;
    Ok(schema)
}

pub struct SchemaFunction;

impl RuleFunction for SchemaFunction {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, options: &Value) -> Result<Box<dyn PreparedFunction>, FunctionError> {
        Ok(Box::new(load(options)?))
    }
}

impl PreparedFunction for Schema {
    fn call(&self, input: &FunctionInput<'_>) -> Result<AssertionResult, FunctionError> {
        let Some(value) = input.value else {
            return Ok(AssertionResult::pass());
        };

        Ok(match check(self, value, "") {
            None => AssertionResult::pass(),
            Some(violation) => {
                let property = if violation.property.is_empty() {
                    input.property()
                } else {
                    violation.property
                };
                AssertionResult::fail(violation.error)
                    .with_detail("property", property)
                    .with_detail("value", display_value(value))
            }
        })
    }
}
