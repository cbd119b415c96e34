//! # scout-engine
//!
//! Rule compilation and event evaluation for a Sigma-style detection
//! engine.
//!
//! The pipeline: decoded rule handles (from `scout-rule`) are compiled
//! into immutable [`Tree`]s of boolean [`Node`]s with pre-compiled
//! [`ValueMatcher`] leaves, then grouped into a [`Ruleset`] that evaluates
//! arbitrary events. Events are anything implementing the two capability
//! traits [`Selector`] (field lookup) and [`Keyworder`] (free-text
//! strings); [`DynamicEvent`] adapts raw JSON with dot-notation access.
//!
//! Evaluation never fails and never mutates: a rule either matches an
//! event or it does not, and absent fields simply fail to match.
//!
//! ## Quick start
//!
//! ```rust
//! use scout_engine::{DynamicEvent, Ruleset};
//! use scout_rule::handle_from_yaml;
//!
//! let handle = handle_from_yaml(r#"
//! title: Whoami Execution
//! id: whoami-1
//! detection:
//!     selection:
//!         Image|endswith: '\whoami.exe'
//!     condition: selection
//! "#, false).unwrap();
//!
//! let ruleset = Ruleset::from_handles(vec![handle]);
//! assert_eq!(ruleset.stats().ok, 1);
//!
//! let event = serde_json::json!({"Image": r"C:\Windows\System32\whoami.exe"});
//! let results = ruleset.eval_all(&DynamicEvent::from_value(&event)).unwrap();
//! assert_eq!(results[0].id, "whoami-1");
//! ```

pub mod compiler;
pub mod error;
pub mod event;
pub mod matcher;
pub mod result;
pub mod ruleset;
pub mod tree;

pub use compiler::compile_tree;
pub use error::{CompileError, Result, RuleFailure, RulesetError};
pub use event::{DynamicEvent, Event, Keyworder, Selector};
pub use matcher::ValueMatcher;
pub use result::{Results, RuleResult};
pub use ruleset::{Config, Ruleset, Stats};
pub use tree::{Node, Threshold, Tree};
