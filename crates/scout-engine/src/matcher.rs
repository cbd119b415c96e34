//! Compiled value matchers — the leaf-node evaluation strategies.
//!
//! Every matcher is pre-compiled at rule load time: glob literals are
//! classified into contains/prefix/suffix modes, complex globs and `/…/`
//! patterns become compiled regexes, and whitespace collapse plus case
//! folding are baked into the stored pattern. At evaluation time
//! `matches()` compares against a JSON value from the event with no
//! further compilation.

use std::borrow::Cow;

use regex::Regex;
use serde_json::Value;

/// A pre-compiled matcher for a single value comparison.
///
/// String matchers store their values in the form needed for comparison
/// (whitespace-collapsed unless disabled, lowercased for case-insensitive).
/// The flags control how the candidate is normalized before comparison.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// Exact string equality.
    Exact {
        value: String,
        case_insensitive: bool,
        collapse_ws: bool,
    },

    /// Substring containment.
    Contains {
        value: String,
        case_insensitive: bool,
        collapse_ws: bool,
    },

    /// String starts with prefix.
    StartsWith {
        value: String,
        case_insensitive: bool,
        collapse_ws: bool,
    },

    /// String ends with suffix.
    EndsWith {
        value: String,
        case_insensitive: bool,
        collapse_ws: bool,
    },

    /// Compiled regex pattern (flags baked in at compile time). Glob-derived
    /// patterns keep the rule's whitespace-collapse setting; explicit regex
    /// values match the candidate verbatim.
    Regex { regex: Regex, collapse_ws: bool },

    /// Numeric equality.
    NumericEq(f64),
    /// Numeric greater-than.
    NumericGt(f64),
    /// Numeric greater-than-or-equal.
    NumericGte(f64),
    /// Numeric less-than.
    NumericLt(f64),
    /// Numeric less-than-or-equal.
    NumericLte(f64),

    /// Boolean equality.
    BoolEq(bool),

    /// Match null / missing values.
    Null,

    /// Match if ANY child matches (OR across a value list).
    AnyOf(Vec<ValueMatcher>),

    /// Match if ALL children match (`|all` modifier).
    AllOf(Vec<ValueMatcher>),
}

impl ValueMatcher {
    /// Check this matcher against a JSON value from an event.
    ///
    /// Numbers and booleans are coerced to strings for string matchers and
    /// strings are parsed for numeric matchers; an array matches if any
    /// element matches.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueMatcher::Exact { .. }
            | ValueMatcher::Contains { .. }
            | ValueMatcher::StartsWith { .. }
            | ValueMatcher::EndsWith { .. }
            | ValueMatcher::Regex { .. } => match_str_value(value, &|s| self.matches_str(s)),

            ValueMatcher::NumericEq(n) => {
                match_numeric_value(value, &|v| (v - n).abs() < f64::EPSILON)
            }
            ValueMatcher::NumericGt(n) => match_numeric_value(value, &|v| v > *n),
            ValueMatcher::NumericGte(n) => match_numeric_value(value, &|v| v >= *n),
            ValueMatcher::NumericLt(n) => match_numeric_value(value, &|v| v < *n),
            ValueMatcher::NumericLte(n) => match_numeric_value(value, &|v| v <= *n),

            ValueMatcher::BoolEq(expected) => match value {
                Value::Bool(b) => b == expected,
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => *expected,
                    "false" | "0" | "no" => !*expected,
                    _ => false,
                },
                Value::Array(arr) => arr.iter().any(|v| self.matches(v)),
                _ => false,
            },

            ValueMatcher::Null => value.is_null(),

            ValueMatcher::AnyOf(matchers) => matchers.iter().any(|m| m.matches(value)),
            ValueMatcher::AllOf(matchers) => matchers.iter().all(|m| m.matches(value)),
        }
    }

    /// Check this matcher against a candidate string (keyword path and
    /// string-typed field values).
    pub fn matches_str(&self, candidate: &str) -> bool {
        match self {
            ValueMatcher::Exact {
                value,
                case_insensitive,
                collapse_ws,
            } => {
                let s = normalize(candidate, *collapse_ws);
                if *case_insensitive {
                    s.eq_ignore_ascii_case(value)
                } else {
                    s.as_ref() == value.as_str()
                }
            }

            ValueMatcher::Contains {
                value,
                case_insensitive,
                collapse_ws,
            } => {
                let s = normalize(candidate, *collapse_ws);
                if *case_insensitive {
                    s.to_ascii_lowercase().contains(value.as_str())
                } else {
                    s.contains(value.as_str())
                }
            }

            ValueMatcher::StartsWith {
                value,
                case_insensitive,
                collapse_ws,
            } => {
                let s = normalize(candidate, *collapse_ws);
                if *case_insensitive {
                    // get() refuses non-boundary indices, so a prefix length
                    // landing inside a multibyte char is a miss, not a panic
                    s.get(..value.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(value))
                } else {
                    s.starts_with(value.as_str())
                }
            }

            ValueMatcher::EndsWith {
                value,
                case_insensitive,
                collapse_ws,
            } => {
                let s = normalize(candidate, *collapse_ws);
                if *case_insensitive {
                    s.len()
                        .checked_sub(value.len())
                        .and_then(|start| s.get(start..))
                        .is_some_and(|tail| tail.eq_ignore_ascii_case(value))
                } else {
                    s.ends_with(value.as_str())
                }
            }

            ValueMatcher::Regex { regex, collapse_ws } => {
                let s = normalize(candidate, *collapse_ws);
                regex.is_match(&s)
            }

            ValueMatcher::NumericEq(n) => candidate
                .parse::<f64>()
                .is_ok_and(|v| (v - n).abs() < f64::EPSILON),
            ValueMatcher::NumericGt(n) => candidate.parse::<f64>().is_ok_and(|v| v > *n),
            ValueMatcher::NumericGte(n) => candidate.parse::<f64>().is_ok_and(|v| v >= *n),
            ValueMatcher::NumericLt(n) => candidate.parse::<f64>().is_ok_and(|v| v < *n),
            ValueMatcher::NumericLte(n) => candidate.parse::<f64>().is_ok_and(|v| v <= *n),

            ValueMatcher::BoolEq(expected) => match candidate.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => *expected,
                "false" | "0" | "no" => !*expected,
                _ => false,
            },

            ValueMatcher::Null => false,

            ValueMatcher::AnyOf(matchers) => matchers.iter().any(|m| m.matches_str(candidate)),
            ValueMatcher::AllOf(matchers) => matchers.iter().all(|m| m.matches_str(candidate)),
        }
    }
}

/// Try to extract a string representation from a JSON value and apply a
/// predicate. Numbers and bools are coerced; arrays match any element.
fn match_str_value(value: &Value, pred: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::String(s) => pred(s),
        Value::Number(n) => pred(&n.to_string()),
        Value::Bool(b) => pred(if *b { "true" } else { "false" }),
        Value::Array(arr) => arr.iter().any(|v| match_str_value(v, pred)),
        _ => false,
    }
}

/// Try to extract a numeric value and apply a predicate. Strings are
/// parsed; arrays match any element.
fn match_numeric_value(value: &Value, pred: &dyn Fn(f64) -> bool) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(pred),
        Value::String(s) => s.parse::<f64>().is_ok_and(pred),
        Value::Array(arr) => arr.iter().any(|v| match_numeric_value(v, pred)),
        _ => false,
    }
}

fn normalize(s: &str, collapse: bool) -> Cow<'_, str> {
    if collapse { collapse_ws(s) } else { Cow::Borrowed(s) }
}

/// Collapse every run of whitespace into a single space.
///
/// Applied to compiled literals and, at evaluation time, to candidate
/// values, so `"cmd   /c  echo"` compares equal to `"cmd /c echo"`.
pub fn collapse_ws(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_whitespace() && c != ' ')
        && !s.contains("  ")
    {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    Cow::Owned(out)
}

// ---------------------------------------------------------------------------
// Glob literal handling
// ---------------------------------------------------------------------------
// Value literals use `*` (multi-char) and `?` (single-char) wildcards.
// Backslash escapes `*`, `?`, and itself; before any other character it is
// a literal backslash, which keeps Windows paths like `C:\Windows` intact.

/// A tokenized part of a glob literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobPart {
    Plain(String),
    /// `*` — any run of characters.
    Star,
    /// `?` — any single character.
    Question,
}

/// Tokenize a literal into plain runs and wildcards, honoring escapes.
pub fn glob_parts(s: &str) -> Vec<GlobPart> {
    let mut parts: Vec<GlobPart> = Vec::new();
    let mut acc = String::new();
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            if c == '*' || c == '?' || c == '\\' {
                acc.push(c);
            } else {
                acc.push('\\');
                acc.push(c);
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '*' {
            if !acc.is_empty() {
                parts.push(GlobPart::Plain(std::mem::take(&mut acc)));
            }
            parts.push(GlobPart::Star);
        } else if c == '?' {
            if !acc.is_empty() {
                parts.push(GlobPart::Plain(std::mem::take(&mut acc)));
            }
            parts.push(GlobPart::Question);
        } else {
            acc.push(c);
        }
    }

    if escaped {
        acc.push('\\');
    }
    if !acc.is_empty() {
        parts.push(GlobPart::Plain(acc));
    }
    parts
}

/// Whether any part is a wildcard.
pub fn has_wildcards(parts: &[GlobPart]) -> bool {
    parts.iter().any(|p| !matches!(p, GlobPart::Plain(_)))
}

/// Convert tokenized glob parts into an anchored regex pattern string.
///
/// `*` becomes `.*`, `?` becomes `.`, plain text is regex-escaped.
pub fn glob_to_regex(parts: &[GlobPart], case_insensitive: bool) -> String {
    let mut pattern = String::new();
    if case_insensitive {
        pattern.push_str("(?i)");
    }
    pattern.push('^');
    for part in parts {
        match part {
            GlobPart::Plain(text) => pattern.push_str(&regex::escape(text)),
            GlobPart::Star => pattern.push_str(".*"),
            GlobPart::Question => pattern.push('.'),
        }
    }
    pattern.push('$');
    pattern
}
