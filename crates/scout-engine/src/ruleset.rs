//! Rule collections: bulk loading, compile statistics, and fan-out
//! evaluation.
//!
//! A [`Ruleset`] owns every compiled tree behind one `RwLock`, so
//! evaluation runs read-many while a reload swaps rules, statistics, and
//! error list in a single write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use scout_rule::{RuleHandle, decode_rule_files, rule_files};
use serde::Serialize;

use crate::compiler::compile_tree;
use crate::error::{Result, RuleFailure, RulesetError};
use crate::event::Event;
use crate::result::Results;
use crate::tree::Tree;

/// Ruleset construction options.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Root directories to discover rule files under.
    pub directories: Vec<PathBuf>,
    /// Abort construction on the first rule that fails to compile,
    /// instead of recording it and moving on.
    pub fail_on_rule_parse: bool,
    /// Abort construction when any file fails to decode as YAML,
    /// instead of counting it as a failed rule.
    pub fail_on_yaml_parse: bool,
    /// Disable whitespace-collapsing normalization during matching.
    pub no_collapse_ws: bool,
}

/// Compile statistics for one ruleset build.
///
/// `ok + failed + unsupported == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub unsupported: usize,
}

#[derive(Debug, Default)]
struct Inner {
    rules: Vec<Tree>,
    stats: Stats,
    errors: Vec<RuleFailure>,
}

/// A compiled rule collection.
///
/// Construction is tolerant by default: rules that fail to compile are
/// counted and recorded, not fatal. Only infrastructure problems (missing
/// rule directories, unreadable roots) abort a load.
#[derive(Debug, Default)]
pub struct Ruleset {
    inner: RwLock<Inner>,
}

impl Ruleset {
    /// Discover, decode, and compile every rule under the configured
    /// directories.
    pub fn load(config: &Config) -> Result<Ruleset> {
        let files = rule_files(&config.directories)?;
        let loaded = decode_rule_files(&files, config.no_collapse_ws);

        if config.fail_on_yaml_parse {
            if let Some(first) = loaded.failures.first() {
                return Err(RulesetError::BulkDecode {
                    count: loaded.failures.len(),
                    first: first.to_string(),
                });
            }
        }

        let mut inner = compile_handles(loaded.handles, config.fail_on_rule_parse)?;

        // A file that never decoded still counts toward the totals.
        for failure in loaded.failures {
            inner.stats.total += 1;
            inner.stats.failed += 1;
            inner.errors.push(RuleFailure {
                path: failure.path,
                error: crate::error::CompileError::InvalidSpec(failure.error.to_string()),
            });
        }

        // Decode failures were appended after compile failures; restore the
        // discovered-file order so errors read in input order.
        let order: HashMap<&Path, usize> = files
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_path(), i))
            .collect();
        inner
            .errors
            .sort_by_key(|f| order.get(f.path.as_path()).copied().unwrap_or(usize::MAX));

        Ok(Ruleset {
            inner: RwLock::new(inner),
        })
    }

    /// Build a ruleset from pre-decoded handles. Never fails; compile
    /// problems land in the statistics and error list.
    pub fn from_handles(handles: Vec<RuleHandle>) -> Ruleset {
        let inner = match compile_handles(handles, false) {
            Ok(inner) => inner,
            // fail-fast is off, so compile_handles cannot error
            Err(_) => Inner::default(),
        };
        Ruleset {
            inner: RwLock::new(inner),
        }
    }

    /// Evaluate every rule against one event, in ruleset order.
    ///
    /// `None` when nothing matched, `Some` with at least one result
    /// otherwise. Never fails and never mutates.
    pub fn eval_all<E: Event + ?Sized>(&self, event: &E) -> Option<Results> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let results: Results = inner
            .rules
            .iter()
            .filter_map(|tree| tree.eval(event))
            .collect();
        if results.is_empty() { None } else { Some(results) }
    }

    /// Compile statistics from the most recent build or reload.
    pub fn stats(&self) -> Stats {
        match self.inner.read() {
            Ok(guard) => guard.stats,
            Err(poisoned) => poisoned.into_inner().stats,
        }
    }

    /// Per-rule compile failures, in rule input order.
    pub fn errors(&self) -> Vec<RuleFailure> {
        match self.inner.read() {
            Ok(guard) => guard.errors.clone(),
            Err(poisoned) => poisoned.into_inner().errors.clone(),
        }
    }

    /// Number of successfully compiled rules.
    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(guard) => guard.rules.len(),
            Err(poisoned) => poisoned.into_inner().rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the entire rule collection in one write-lock swap.
    ///
    /// Readers observe either the old collection or the new one, never a
    /// mix; statistics and errors swap together with the rules.
    pub fn reload(&self, handles: Vec<RuleHandle>) {
        let inner = match compile_handles(handles, false) {
            Ok(inner) => inner,
            Err(_) => Inner::default(),
        };
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = inner;
    }
}

fn compile_handles(handles: Vec<RuleHandle>, fail_fast: bool) -> Result<Inner> {
    let mut inner = Inner::default();
    for handle in handles {
        inner.stats.total += 1;
        let path = handle.path.clone();
        match compile_tree(handle) {
            Ok(tree) => {
                inner.stats.ok += 1;
                inner.rules.push(tree);
            }
            Err(error) => {
                if error.is_unsupported() {
                    inner.stats.unsupported += 1;
                } else {
                    inner.stats.failed += 1;
                }
                let failure = RuleFailure { path, error };
                if fail_fast && !failure.error.is_unsupported() {
                    return Err(RulesetError::Compile(failure));
                }
                inner.errors.push(failure);
            }
        }
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DynamicEvent;
    use scout_rule::handle_from_yaml;
    use serde_json::json;

    const WHOAMI: &str = r#"
title: Whoami Execution
id: rule-whoami
detection:
    selection:
        Image|endswith: '\whoami.exe'
    condition: selection
"#;

    const BROKEN: &str = r#"
title: Broken
id: rule-broken
detection:
    selection:
        Image: x
    condition: selection and (
"#;

    const MULTIPART: &str = r#"
title: Multipart
id: rule-multipart
detection:
    selection:
        Image: x
    condition: selection
---
title: Second Body
"#;

    fn handles(sources: &[&str]) -> Vec<RuleHandle> {
        sources
            .iter()
            .map(|s| handle_from_yaml(s, false).unwrap())
            .collect()
    }

    #[test]
    fn stats_partition_the_total() {
        let set = Ruleset::from_handles(handles(&[WHOAMI, BROKEN, MULTIPART]));
        let stats = set.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unsupported, 1);
        assert_eq!(stats.ok + stats.failed + stats.unsupported, stats.total);
        assert_eq!(set.errors().len(), 2);
    }

    #[test]
    fn eval_all_returns_none_without_matches() {
        let set = Ruleset::from_handles(handles(&[WHOAMI]));
        let miss = json!({"Image": "C:\\Windows\\explorer.exe"});
        assert!(set.eval_all(&DynamicEvent::from_value(&miss)).is_none());

        let hit = json!({"Image": "C:\\Windows\\System32\\whoami.exe"});
        let results = set.eval_all(&DynamicEvent::from_value(&hit)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "rule-whoami");
    }

    #[test]
    fn broken_rules_do_not_block_evaluation() {
        let set = Ruleset::from_handles(handles(&[BROKEN, WHOAMI]));
        let hit = json!({"Image": "C:\\whoami.exe"});
        let results = set.eval_all(&DynamicEvent::from_value(&hit)).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn reload_swaps_everything() {
        let set = Ruleset::from_handles(handles(&[WHOAMI]));
        assert_eq!(set.len(), 1);

        set.reload(handles(&[WHOAMI, BROKEN]));
        assert_eq!(set.len(), 1);
        assert_eq!(set.stats().total, 2);
        assert_eq!(set.stats().failed, 1);
    }

    #[test]
    fn load_from_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("whoami.yml"), WHOAMI).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skipped").unwrap();

        let config = Config {
            directories: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        let set = Ruleset::load(&config).unwrap();
        assert_eq!(set.stats().ok, 1);
    }

    #[test]
    fn errors_follow_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), BROKEN).unwrap();
        std::fs::write(dir.path().join("b.yml"), "title: [unclosed").unwrap();
        std::fs::write(dir.path().join("c.yml"), BROKEN).unwrap();

        let config = Config {
            directories: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        let set = Ruleset::load(&config).unwrap();
        let names: Vec<String> = set
            .errors()
            .iter()
            .map(|f| {
                f.path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yml", "c.yml"]);
    }

    #[test]
    fn yaml_failures_fatal_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yml"), "title: [unclosed").unwrap();

        let tolerant = Config {
            directories: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        let set = Ruleset::load(&tolerant).unwrap();
        assert_eq!(set.stats().failed, 1);

        let strict = Config {
            fail_on_yaml_parse: true,
            ..tolerant
        };
        assert!(matches!(
            Ruleset::load(&strict),
            Err(RulesetError::BulkDecode { count: 1, .. })
        ));
    }

    #[test]
    fn rule_failures_fatal_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yml"), BROKEN).unwrap();

        let strict = Config {
            directories: vec![dir.path().to_path_buf()],
            fail_on_rule_parse: true,
            ..Config::default()
        };
        assert!(matches!(
            Ruleset::load(&strict),
            Err(RulesetError::Compile(_))
        ));

        // Unsupported rules are skipped, not fatal, even in strict mode.
        std::fs::write(dir.path().join("broken.yml"), MULTIPART).unwrap();
        let set = Ruleset::load(&strict).unwrap();
        assert_eq!(set.stats().unsupported, 1);
    }

    #[test]
    fn missing_directory_is_fatal() {
        let config = Config {
            directories: vec![PathBuf::from("/nonexistent/rules")],
            ..Config::default()
        };
        assert!(matches!(
            Ruleset::load(&config),
            Err(RulesetError::Load(_))
        ));
    }
}
