//! # scout-rule
//!
//! Rule data model, loader, and condition expression parser for a
//! Sigma-style detection engine.
//!
//! This crate handles everything up to compilation:
//!
//! - **Rule decoding**: YAML rule documents into [`RawRule`] values, with
//!   multi-document sources flagged as multipart
//! - **Discovery**: recursive `.yml`/`.yaml` file listing under one or more
//!   root directories, with per-file failures collected rather than fatal
//! - **Condition expressions**: `and`, `or`, `not`, parenthesized groups,
//!   and quantified selectors (`1 of selection_*`, `all of them`) parsed
//!   into a [`ConditionExpr`] AST with a PEG grammar ([`pest`]) and a Pratt
//!   parser for correct operator precedence (`NOT` > `AND` > `OR`)
//!
//! The evaluation side (matchers, compiled trees, rulesets) lives in the
//! `scout-engine` crate.
//!
//! ## Quick start
//!
//! ```rust
//! use scout_rule::{handle_from_yaml, parse_condition};
//!
//! let handle = handle_from_yaml(r#"
//! title: Detect Whoami
//! id: whoami-1
//! detection:
//!     selection:
//!         CommandLine|contains: 'whoami'
//!     condition: selection
//! "#, false).unwrap();
//! assert_eq!(handle.rule.title, "Detect Whoami");
//!
//! let expr = parse_condition("selection and not 1 of filter_*").unwrap();
//! println!("{expr}");
//! ```

pub mod ast;
pub mod condition;
pub mod error;
pub mod loader;
pub mod rule;

pub use ast::{ConditionExpr, Quantifier, SelectorPattern};
pub use condition::parse_condition;
pub use error::{Result, RuleError};
pub use loader::{
    DecodeFailure, LoadedRules, decode_rule_files, decode_rule_str, handle_from_yaml, rule_files,
};
pub use rule::{Detection, LogSource, RawRule, RuleHandle};
