//! Severities and the diagnostics a run reports

use crate::document::JsonPath;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How serious a rule violation is. Ordered from `Off` up to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// Never evaluated
    Off,
    Hint,
    Info,
    #[default]
    Warn,
    /// Sets `has_errors` on the report
    Error,
}

impl Severity {
    /// Canonical name used in rule catalogues
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Off => "off",
            Severity::Hint => "hint",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// Numeric form used by catalogues (0 = error ... 3 = hint, -1 = off)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Severity::Off),
            0 => Some(Severity::Error),
            1 => Some(Severity::Warn),
            2 => Some(Severity::Info),
            3 => Some(Severity::Hint),
            _ => None,
        }
    }

    pub fn is_off(&self) -> bool {
        *self == Severity::Off
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(Severity::Off),
            "hint" => Ok(Severity::Hint),
            "info" | "information" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" | "fatal" => Ok(Severity::Error),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Code(i64),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
            Raw::Code(code) => Severity::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("Unknown severity code: {}", code))),
            // `false` disables a rule, `true` keeps the default
            Raw::Flag(false) => Ok(Severity::Off),
            Raw::Flag(true) => Ok(Severity::default()),
        }
    }
}

/// A lint diagnostic produced by one failed assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    /// Where in the document the failing value sits
    pub path: JsonPath,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
}

impl Diagnostic {
    pub fn new(rule_id: &str, severity: Severity, path: JsonPath, message: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            path,
            message: message.to_string(),
            documentation_url: None,
        }
    }

    pub fn with_documentation_url(mut self, url: Option<&str>) -> Self {
        self.documentation_url = url.map(String::from);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }
}
