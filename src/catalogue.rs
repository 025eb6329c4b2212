//! Bundled rule catalogues
//!
//! The catalogues are plain data under `rulesets/`, embedded at compile
//! time so the engine needs no files at runtime.

use crate::ruleset::{Ruleset, RulesetLoadError};

/// Identity of the NLGov API Design Rules core catalogues
pub const ADR_URI: &str = "https://logius-standaarden.github.io/API-Design-Rules";

/// Identity of the API Design Rules 2.0 catalogue
pub const ADR_20_URI: &str = "https://logius-standaarden.github.io/API-Design-Rules/2.0";

/// A catalogue shipped with the crate
struct Bundled {
    name: &'static str,
    source: &'static str,
    /// Part of [`builtin_rulesets`]
    registered: bool,
}

const ADR_CORE: Bundled = Bundled {
    name: "adr-core.yaml",
    source: include_str!("../rulesets/adr-core.yaml"),
    registered: true,
};

/// Shares the core URI, so registering it next to `adr-core` would
/// replace the core rules
const FEATURES_CORE: Bundled = Bundled {
    name: "features-core.yaml",
    source: include_str!("../rulesets/features-core.yaml"),
    registered: false,
};

const ADR_20: Bundled = Bundled {
    name: "adr-20.yaml",
    source: include_str!("../rulesets/adr-20.yaml"),
    registered: true,
};

/// In registration order
const CATALOGUES: &[Bundled] = &[ADR_CORE, FEATURES_CORE, ADR_20];

/// Names of every bundled catalogue
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOGUES.iter().map(|bundled| bundled.name)
}

fn parse(bundled: &Bundled) -> Result<Ruleset, RulesetLoadError> {
    Ruleset::from_yaml_str(bundled.source).map_err(|e| match e {
        RulesetLoadError::Parse { message, .. } => RulesetLoadError::Parse {
            file: bundled.name.to_string(),
            message,
        },
        other => other,
    })
}

/// The catalogues registered by default (`adr-core`, `adr-20`), in
/// registration order
pub fn builtin_rulesets() -> Result<Vec<Ruleset>, RulesetLoadError> {
    CATALOGUES
        .iter()
        .filter(|bundled| bundled.registered)
        .map(parse)
        .collect()
}

/// Every bundled catalogue, registered or not
pub fn all_rulesets() -> Result<Vec<Ruleset>, RulesetLoadError> {
    CATALOGUES.iter().map(parse).collect()
}

/// The `features-core` catalogue: the core rules plus the `/openapi.json`
/// resource checks. Not registered by default.
pub fn features_core() -> Result<Ruleset, RulesetLoadError> {
    parse(&FEATURES_CORE)
}
