//! Raw rule data model: the decoded YAML form of a detection rule plus the
//! provenance-carrying handle the compiler consumes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Log source metadata of a rule. Informational only; the engine does not
/// route on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSource {
    pub product: String,
    pub category: String,
    pub service: String,
    pub definition: String,
}

/// The `detection:` section of a rule: named search-identifier blocks plus
/// the condition expression, kept in raw YAML form until compilation.
///
/// A `BTreeMap` keeps identifier iteration order deterministic, which the
/// compiler relies on for sorted wildcard expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Detection(pub BTreeMap<String, Value>);

impl Detection {
    /// The condition expression string, if present and a plain string.
    pub fn condition(&self) -> Option<&Value> {
        self.0.get("condition")
    }

    /// Look up a named search identifier. The `condition` key is not an
    /// identifier and is never returned.
    pub fn identifier(&self, name: &str) -> Option<&Value> {
        if name == "condition" {
            return None;
        }
        self.0.get(name)
    }

    /// Iterate named search identifiers in sorted order, skipping the
    /// condition key.
    pub fn identifiers(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != "condition")
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Number of named search identifiers.
    pub fn identifier_count(&self) -> usize {
        self.identifiers().count()
    }
}

/// A decoded rule definition. Immutable once decoded.
///
/// Unknown YAML keys are ignored; absent keys default to empty so partial
/// rules from the wild still decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub level: String,
    pub status: String,
    pub references: Vec<String>,
    pub tags: Vec<String>,
    pub falsepositives: Vec<String>,
    pub fields: Vec<String>,
    pub logsource: LogSource,
    pub detection: Detection,
}

/// A raw rule plus provenance and load-time flags. Created by the loader,
/// consumed exactly once by the tree compiler.
#[derive(Debug, Clone)]
pub struct RuleHandle {
    pub rule: RawRule,
    /// Source file path (empty for rules decoded from strings).
    pub path: PathBuf,
    /// True when the source document contained more than one rule body.
    /// Multipart handles are never compiled.
    pub multipart: bool,
    /// Disables whitespace-collapsing normalization during matching.
    pub no_collapse_ws: bool,
}

impl RuleHandle {
    pub fn new(rule: RawRule, path: PathBuf) -> Self {
        RuleHandle {
            rule,
            path,
            multipart: false,
            no_collapse_ws: false,
        }
    }

    pub fn multipart(mut self, multipart: bool) -> Self {
        self.multipart = multipart;
        self
    }

    pub fn no_collapse_ws(mut self, no_collapse_ws: bool) -> Self {
        self.no_collapse_ws = no_collapse_ws;
        self
    }
}
