//! Compilation and ruleset construction errors.
//!
//! Evaluation itself never fails: absent fields and unmatched types
//! resolve to "no match". Errors exist only at compile and load time.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from compiling one rule into a tree.
///
/// A compile error is terminal for that one rule only; ruleset
/// construction records it and moves on.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The source document contained more than one rule body.
    #[error("multipart rule documents are not supported")]
    MultipartRule,

    /// The rule uses a construct the engine deliberately does not
    /// implement (unknown modifier, non-string condition, ...).
    #[error("unsupported token: {0}")]
    UnsupportedToken(String),

    /// The detection section has no condition expression.
    #[error("missing condition expression")]
    MissingCondition,

    /// The condition string failed to parse.
    #[error("condition parse error: {0}")]
    Condition(String),

    /// The condition references an identifier the rule does not define.
    #[error("undefined search identifier: {0}")]
    UndefinedIdentifier(String),

    /// A wildcard identifier pattern matched nothing.
    #[error("identifier pattern '{0}' matches no search identifiers")]
    EmptyExpansion(String),

    /// A quantifier count exceeds the resolved group size.
    #[error("quantifier {count} exceeds group size {size}")]
    QuantifierOutOfRange { count: u64, size: usize },

    /// A quantifier count that can never be satisfied meaningfully.
    #[error("malformed quantifier: {0}")]
    MalformedQuantifier(String),

    /// A search identifier's matcher specification is malformed.
    #[error("invalid matcher specification: {0}")]
    InvalidSpec(String),

    /// A regex value failed to compile.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl CompileError {
    /// Whether this failure counts as "unsupported" rather than "failed"
    /// in ruleset statistics.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            CompileError::MultipartRule | CompileError::UnsupportedToken(_)
        )
    }
}

/// A compile failure tied to its source rule.
#[derive(Debug, Clone)]
pub struct RuleFailure {
    pub path: PathBuf,
    pub error: CompileError,
}

impl std::fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Errors fatal to ruleset construction.
#[derive(Debug, Error)]
pub enum RulesetError {
    /// Root discovery or decoding infrastructure failed.
    #[error(transparent)]
    Load(#[from] scout_rule::RuleError),

    /// Document decode failures with failure-tolerance disabled.
    #[error("{count} rule document(s) failed to decode (first: {first})")]
    BulkDecode { count: usize, first: String },

    /// A rule failed to compile with failure-tolerance disabled.
    #[error("rule compilation failed: {0}")]
    Compile(RuleFailure),
}

pub type Result<T> = std::result::Result<T, RulesetError>;
