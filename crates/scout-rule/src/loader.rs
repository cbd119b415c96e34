//! Rule file discovery and decoding.
//!
//! Discovery walks one or more root directories recursively and collects
//! `.yml`/`.yaml` files in sorted order. Decoding turns each file into a
//! [`RuleHandle`], marking multi-document files as multipart. Per-file
//! decode failures are collected, not fatal; only root discovery problems
//! abort the batch.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, RuleError};
use crate::rule::{RawRule, RuleHandle};

/// A per-file decode failure.
#[derive(Debug)]
pub struct DecodeFailure {
    pub path: PathBuf,
    pub error: RuleError,
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Outcome of a bulk decode: the handles that decoded plus every per-file
/// failure. Callers decide whether failures are fatal.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub handles: Vec<RuleHandle>,
    pub failures: Vec<DecodeFailure>,
}

/// Recursively list rule source files under each root, sorted per directory.
///
/// Fails when a root is missing, is not a directory, or cannot be read.
pub fn rule_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Err(RuleError::NoRuleDirectories);
    }
    for root in roots {
        if !root.exists() {
            return Err(RuleError::MissingRoot(root.clone()));
        }
        if !root.is_dir() {
            return Err(RuleError::NotADirectory(root.clone()));
        }
    }

    let mut files = Vec::new();
    for root in roots {
        walk(root, &mut files)?;
    }
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml" | "yaml")
        ) {
            files.push(path);
        }
    }
    Ok(())
}

/// Decode a batch of rule files into handles.
///
/// Read and decode failures go into [`LoadedRules::failures`]; the batch
/// itself always succeeds.
pub fn decode_rule_files(files: &[PathBuf], no_collapse_ws: bool) -> LoadedRules {
    let mut loaded = LoadedRules::default();
    for path in files {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                loaded.failures.push(DecodeFailure {
                    path: path.clone(),
                    error: e.into(),
                });
                continue;
            }
        };
        match decode_rule_str(&text, path.clone(), no_collapse_ws) {
            Ok(handle) => loaded.handles.push(handle),
            Err(e) => loaded.failures.push(DecodeFailure {
                path: path.clone(),
                error: e,
            }),
        }
    }
    loaded
}

/// Decode one YAML source into a handle.
///
/// Multi-document sources decode only the first document and mark the
/// handle multipart; the compiler rejects such handles as unsupported.
pub fn decode_rule_str(yaml: &str, path: PathBuf, no_collapse_ws: bool) -> Result<RuleHandle> {
    let mut docs = serde_yaml::Deserializer::from_str(yaml);

    let first = docs
        .next()
        .ok_or_else(|| RuleError::Condition("empty rule document".to_string()))?;
    let rule = RawRule::deserialize(first)?;
    let multipart = docs.next().is_some();

    Ok(RuleHandle::new(rule, path)
        .multipart(multipart)
        .no_collapse_ws(no_collapse_ws))
}

/// Convenience wrapper for embedding rules from strings (tests, demos).
pub fn handle_from_yaml(yaml: &str, no_collapse_ws: bool) -> Result<RuleHandle> {
    decode_rule_str(yaml, PathBuf::new(), no_collapse_ws)
}
