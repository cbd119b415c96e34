use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or parsing rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("YAML decode error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("condition parse error: {0}")]
    Condition(String),

    #[error("missing root directory for rules")]
    NoRuleDirectories,

    #[error("{} does not exist", .0.display())]
    MissingRoot(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
