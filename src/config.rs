//! Engine configuration
//!
//! Looked up as `.adrlintrc.{yaml,yml,json}` or `adrlint.{yaml,yml,json}`,
//! first in the working directory and then in the home directory:
//!
//! ```yaml
//! extends: [../shared/adrlint.yaml]
//! engine:
//!   parallel: true
//!   jobs: 0          # 0 = one worker per CPU
//!   timeout_ms: 5000
//! rules:
//!   disabled: [paths-kebab-case]
//!   severity:
//!     semver: warn
//! rulesets:
//!   profiles: [https://logius-standaarden.github.io/API-Design-Rules/2.0]
//! ```

use crate::diagnostic::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File names tried by [`Config::load_default`], in priority order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".adrlintrc.yaml",
    ".adrlintrc.yml",
    ".adrlintrc.json",
    "adrlint.yaml",
    "adrlint.yml",
    "adrlint.json",
];

/// `extends` chains deeper than this are rejected
const MAX_EXTENDS_DEPTH: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config {path} extends more than {limit} levels deep")]
    InheritanceDepth { path: PathBuf, limit: usize },
}

/// How a run is scheduled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Spread rules over a thread pool; on unless set to `false`
    pub parallel: Option<bool>,

    /// Worker threads; 0 picks one per CPU
    pub jobs: usize,

    /// Run deadline in milliseconds, checked before each rule starts
    pub timeout_ms: Option<u64>,
}

impl EngineConfig {
    pub fn is_parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn thread_count(&self) -> usize {
        match self.jobs {
            0 => num_cpus::get(),
            jobs => jobs,
        }
    }
}

/// Per-rule switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule IDs forced to `off`
    pub disabled: Vec<String>,

    /// When non-empty, the only rules allowed to run
    pub enabled: Vec<String>,

    /// Severity per rule ID, replacing the catalogue's
    pub severity: HashMap<String, Severity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesetsConfig {
    /// Identifiers every linted document is treated as declaring
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base configs, applied in order beneath this one
    pub extends: Vec<String>,
    pub engine: EngineConfig,
    pub rules: RulesConfig,
    pub rulesets: RulesetsConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file and everything it extends
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_chain(path, 0)
    }

    fn load_chain(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        if depth >= MAX_EXTENDS_DEPTH {
            return Err(ConfigError::InheritanceDepth {
                path: path.to_path_buf(),
                limit: MAX_EXTENDS_DEPTH,
            });
        }

        let own = Self::parse_file(path)?;
        if own.extends.is_empty() {
            return Ok(own);
        }

        let dir = path.parent().unwrap_or(Path::new("."));
        let mut merged = Self::default();
        for base in &own.extends {
            merged.merge(Self::load_chain(&dir.join(base), depth + 1)?);
        }
        merged.merge(own);
        Ok(merged)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            other => Err(ConfigError::Invalid(format!(
                "{}: unsupported config format '{}'",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }

    /// Layer `other` on top of `self`. Lists of disabled rules and profiles
    /// accumulate; scalars and the enabled list are replaced only when
    /// `other` sets them.
    pub fn merge(&mut self, other: Self) {
        let Self {
            extends: _,
            engine,
            rules,
            rulesets,
        } = other;

        self.engine.parallel = engine.parallel.or(self.engine.parallel);
        if engine.jobs > 0 {
            self.engine.jobs = engine.jobs;
        }
        self.engine.timeout_ms = engine.timeout_ms.or(self.engine.timeout_ms);

        for id in rules.disabled {
            if !self.rules.disabled.contains(&id) {
                self.rules.disabled.push(id);
            }
        }
        if !rules.enabled.is_empty() {
            self.rules.enabled = rules.enabled;
        }
        self.rules.severity.extend(rules.severity);

        for profile in rulesets.profiles {
            if !self.rulesets.profiles.contains(&profile) {
                self.rulesets.profiles.push(profile);
            }
        }
    }

    /// First config file found in the working directory, then the home
    /// directory; defaults when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        let dirs = [Some(PathBuf::from(".")), dirs::home_dir()];
        let found = dirs
            .iter()
            .flatten()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file());

        match found {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        let listed = |ids: &[String]| ids.iter().any(|id| id == rule_id);
        !listed(&self.rules.disabled)
            && (self.rules.enabled.is_empty() || listed(&self.rules.enabled))
    }

    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.rules.severity.get(rule_id).copied()
    }

    /// Severity a rule runs with: `off` when switched off here, otherwise
    /// the configured override, otherwise what the catalogue declares
    pub fn effective_severity(&self, rule_id: &str, declared: Severity) -> Severity {
        if self.is_rule_enabled(rule_id) {
            self.get_severity_override(rule_id).unwrap_or(declared)
        } else {
            Severity::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert!(config.engine.is_parallel());
        assert_eq!(config.engine.timeout(), None);
        assert!(config.engine.thread_count() >= 1);
        assert!(config.rulesets.profiles.is_empty());
        assert!(config.is_rule_enabled("semver"));
    }

    #[test]
    fn test_disabled_and_allow_list() {
        let mut config = Config::new();
        config.rules.disabled.push("paths-kebab-case".to_string());
        assert!(!config.is_rule_enabled("paths-kebab-case"));
        assert!(config.is_rule_enabled("semver"));

        config.rules.enabled = vec!["semver".to_string(), "paths-kebab-case".to_string()];
        assert!(config.is_rule_enabled("semver"));
        assert!(!config.is_rule_enabled("info-version"));
        // Disabling wins over the allow-list
        assert!(!config.is_rule_enabled("paths-kebab-case"));
    }

    #[test]
    fn test_effective_severity() {
        let mut config = Config::new();
        config.rules.severity.insert("semver".to_string(), Severity::Warn);
        config.rules.disabled.push("servers-use-https".to_string());

        assert_eq!(config.effective_severity("semver", Severity::Error), Severity::Warn);
        assert_eq!(config.effective_severity("info-version", Severity::Info), Severity::Info);
        assert_eq!(
            config.effective_severity("servers-use-https", Severity::Error),
            Severity::Off
        );
    }

    #[test]
    fn test_parse_yaml_sections() {
        let config: Config = serde_yaml::from_str(
            r#"
engine:
  parallel: false
  jobs: 4
  timeout_ms: 250
rules:
  disabled: [missing-header]
  severity:
    semver: off
rulesets:
  profiles:
    - https://logius-standaarden.github.io/API-Design-Rules/2.0
"#,
        )
        .unwrap();

        assert!(!config.engine.is_parallel());
        assert_eq!(config.engine.thread_count(), 4);
        assert_eq!(config.engine.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.rules.disabled, vec!["missing-header"]);
        assert_eq!(config.get_severity_override("semver"), Some(Severity::Off));
        assert_eq!(config.rulesets.profiles.len(), 1);
    }

    #[test]
    fn test_extends_layers_child_over_base() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "engine:\n  jobs: 2\n  timeout_ms: 100\nrules:\n  disabled: [a]\n",
        )
        .unwrap();
        let child = dir.path().join(".adrlintrc.json");
        fs::write(
            &child,
            r#"{"extends": ["base.yaml"], "rules": {"disabled": ["b", "a"]}, "engine": {"parallel": false}}"#,
        )
        .unwrap();

        let config = Config::load(&child).unwrap();
        assert_eq!(config.engine.jobs, 2);
        assert_eq!(config.engine.timeout_ms, Some(100));
        assert!(!config.engine.is_parallel());
        assert_eq!(config.rules.disabled, vec!["a", "b"]);
        assert!(config.extends.is_empty());
    }

    #[test]
    fn test_child_keeps_base_scheduling_it_does_not_set() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("base.yaml"), "engine:\n  parallel: false\n").unwrap();
        let child = dir.path().join("adrlint.yaml");
        fs::write(&child, "extends: [base.yaml]\nengine:\n  jobs: 3\n").unwrap();

        let config = Config::load(&child).unwrap();
        assert_eq!(config.engine.parallel, Some(false));
        assert!(!config.engine.is_parallel());
        assert_eq!(config.engine.jobs, 3);

        let mut base = Config::new();
        base.engine.parallel = Some(false);
        base.merge(Config::new());
        assert!(!base.engine.is_parallel());
    }

    #[test]
    fn test_extends_cycle_hits_depth_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loop.yaml");
        fs::write(&path, "extends: [loop.yaml]\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InheritanceDepth { limit: 10, .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adrlint.toml");
        fs::write(&path, "").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }
}
