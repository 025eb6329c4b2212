//! Document tree and location paths
//!
//! The engine never reads raw bytes: a [`Document`] wraps an already-parsed
//! `serde_json::Value` (built with `preserve_order`, so mappings keep their
//! declared key order). The YAML/JSON constructors here are thin adapters for
//! callers that hold text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while ingesting a document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// One step of a location path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// The segment as a string key (indices are rendered as decimal)
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }

    /// The segment as a JSON value, the way `~` selections expose it
    pub fn to_value(&self) -> Value {
        match self {
            PathSegment::Key(k) => Value::String(k.clone()),
            PathSegment::Index(i) => Value::from(*i),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Location of a node, as the sequence of keys/indices from the root.
/// The root itself is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend with a key segment
    pub fn key(mut self, key: &str) -> Self {
        self.0.push(PathSegment::Key(key.to_string()));
        self
    }

    /// Extend with an index segment
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// A new path with `segment` appended
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The enclosing path, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Last segment, i.e. the key under which the node lives
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathSegment>> for JsonPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$' || c == '@')
}

impl fmt::Display for JsonPath {
    /// Renders `servers[0].url`; keys that are not plain identifiers are
    /// bracket-quoted (`paths['/pets'].get`). The root renders as `$`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => write!(f, "['{}']", key.replace('\'', "\\'"))?,
            }
        }
        Ok(())
    }
}

/// Position of a path in depth-first document order.
///
/// Compares segment by segment using each key's position among its
/// siblings; a prefix sorts before its descendants. Segments that do not
/// exist in the document (e.g. a missing field) sort after existing
/// siblings, then by name.
pub type DocumentOrdinal = Vec<(usize, String)>;

/// Look up a child of a node by segment
pub fn child<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        (Value::Array(items), PathSegment::Key(k)) => {
            k.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}

/// Children of a node in declaration order
pub fn children(value: &Value) -> Vec<(PathSegment, &Value)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (PathSegment::Key(k.clone()), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (PathSegment::Index(i), v))
            .collect(),
        _ => Vec::new(),
    }
}

/// An already-parsed API description document
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    profiles: Vec<String>,
    source: Option<PathBuf>,
}

impl Document {
    /// Wrap a parsed tree
    pub fn new(root: Value) -> Self {
        Self {
            root,
            profiles: Vec::new(),
            source: None,
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, DocumentError> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DocumentError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        Ok(Self::new(yaml_to_json(raw)?))
    }

    /// Read a document from disk, picking the adapter from the extension
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let document = match ext {
            "yaml" | "yml" => Self::from_yaml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            _ => return Err(DocumentError::UnsupportedFormat(ext.to_string())),
        };

        Ok(document.with_source(path))
    }

    /// Declare a profile identifier (e.g. a ruleset URI) for this document
    pub fn with_profile(mut self, profile: &str) -> Self {
        if !self.profiles.iter().any(|p| p == profile) {
            self.profiles.push(profile.to_string());
        }
        self
    }

    pub fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve a location path
    pub fn get(&self, path: &JsonPath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| child(node, segment))
    }

    /// Format families detected from the document's version field
    pub fn formats(&self) -> Vec<String> {
        let mut formats = Vec::new();

        if let Some(version) = self.root.get("openapi").and_then(version_string) {
            if version.starts_with('3') {
                formats.push("oas3".to_string());
            }
            if version.starts_with("3.0") {
                formats.push("oas3_0".to_string());
            } else if version.starts_with("3.1") {
                formats.push("oas3_1".to_string());
            }
        }

        if let Some(version) = self.root.get("swagger").and_then(version_string) {
            if version == "2.0" || version == "2" {
                formats.push("oas2".to_string());
            }
        }

        formats
    }

    /// All identifiers the document declares: explicit profiles first,
    /// then detected formats
    pub fn declared_identifiers(&self) -> Vec<String> {
        let mut identifiers = self.profiles.clone();
        for format in self.formats() {
            if !identifiers.contains(&format) {
                identifiers.push(format);
            }
        }
        identifiers
    }

    /// Sort key for a path in depth-first document order
    pub fn ordinal(&self, path: &JsonPath) -> DocumentOrdinal {
        let mut ordinal = Vec::with_capacity(path.len());
        let mut current = Some(&self.root);

        for segment in path.segments() {
            let position = match (current, segment) {
                (Some(Value::Object(map)), PathSegment::Key(k)) => key_position(map, k),
                (Some(Value::Array(items)), PathSegment::Index(i)) if *i < items.len() => Some(*i),
                _ => None,
            };
            ordinal.push((position.unwrap_or(usize::MAX), segment.as_key()));
            current = current.and_then(|node| child(node, segment));
        }

        ordinal
    }
}

fn key_position(map: &Map<String, Value>, key: &str) -> Option<usize> {
    map.keys().position(|k| k == key)
}

fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert a YAML tree into the engine's tree. Non-string keys (e.g. bare
/// `200:` status codes) are stringified; tags are dropped.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, DocumentError> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                map.insert(yaml_key(k)?, yaml_to_json(v)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, DocumentError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        other => Err(DocumentError::Invalid(format!(
            "Unsupported mapping key: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_display() {
        assert_eq!(JsonPath::root().to_string(), "$");
        let path = JsonPath::root().key("servers").index(0).key("url");
        assert_eq!(path.to_string(), "servers[0].url");
        let path = JsonPath::root().key("paths").key("/pets").key("get");
        assert_eq!(path.to_string(), "paths['/pets'].get");
    }

    #[test]
    fn test_path_parent_and_last() {
        let path = JsonPath::root().key("info").key("contact");
        assert_eq!(path.last(), Some(&PathSegment::Key("contact".to_string())));
        assert_eq!(path.parent(), Some(JsonPath::root().key("info")));
        assert_eq!(JsonPath::root().parent(), None);
    }

    #[test]
    fn test_get_by_path() {
        let doc = Document::new(json!({"servers": [{"url": "https://a"}]}));
        let path = JsonPath::root().key("servers").index(0).key("url");
        assert_eq!(doc.get(&path), Some(&json!("https://a")));
        assert_eq!(doc.get(&JsonPath::root()), Some(doc.root()));
        assert_eq!(doc.get(&JsonPath::root().key("missing")), None);
    }

    #[test]
    fn test_yaml_integer_keys_preserve_order() {
        let doc = Document::from_yaml_str(
            "responses:\n  404: {}\n  200: {}\n  default: {}\n",
        )
        .unwrap();
        let keys: Vec<&String> = doc.root()["responses"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["404", "200", "default"]);
    }

    #[test]
    fn test_format_detection() {
        let doc = Document::new(json!({"openapi": "3.0.3"}));
        assert_eq!(doc.formats(), vec!["oas3", "oas3_0"]);

        let doc = Document::new(json!({"openapi": "3.1.0"}));
        assert_eq!(doc.formats(), vec!["oas3", "oas3_1"]);

        let doc = Document::new(json!({"swagger": "2.0"}));
        assert_eq!(doc.formats(), vec!["oas2"]);

        let doc = Document::new(json!({"openapi": "3.0.0"})).with_profile("urn:adr");
        assert_eq!(doc.declared_identifiers(), vec!["urn:adr", "oas3", "oas3_0"]);
    }

    #[test]
    fn test_ordinal_follows_document_order() {
        let doc = Document::new(json!({"paths": {"/b": {}, "/a": {}}, "info": {}}));
        let b = doc.ordinal(&JsonPath::root().key("paths").key("/b"));
        let a = doc.ordinal(&JsonPath::root().key("paths").key("/a"));
        let paths = doc.ordinal(&JsonPath::root().key("paths"));
        let info = doc.ordinal(&JsonPath::root().key("info"));
        let missing = doc.ordinal(&JsonPath::root().key("paths").key("/zz"));

        assert!(paths < b);
        assert!(b < a);
        assert!(a < missing);
        assert!(missing < info);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.yaml");
        std::fs::write(&path, "openapi: 3.0.0\ninfo:\n  title: t\n").unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.root()["info"]["title"], json!("t"));
        assert_eq!(doc.source(), Some(path.as_path()));

        let bad = dir.path().join("api.txt");
        std::fs::write(&bad, "x").unwrap();
        assert!(matches!(
            Document::load(&bad),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }
}
