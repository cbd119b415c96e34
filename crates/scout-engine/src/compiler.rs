//! Rule compilation: turn a decoded rule handle into an evaluable tree.
//!
//! Compilation resolves every identifier reference against the rule's
//! detection map, expands wildcard identifier patterns into sorted concrete
//! sets, validates quantifier counts, and lowers each matcher specification
//! into [`ValueMatcher`] leaves. Each failure aborts only that rule.

use regex::Regex;
use scout_rule::{ConditionExpr, Detection, Quantifier, RuleHandle, SelectorPattern, parse_condition};
use serde_yaml::Value;

use crate::error::CompileError;
use crate::matcher::{GlobPart, ValueMatcher, collapse_ws, glob_parts, glob_to_regex, has_wildcards};
use crate::tree::{Node, Threshold, Tree};

/// Compile one rule handle into a tree.
///
/// Multipart handles are rejected immediately as unsupported and never
/// parsed. Everything else runs the full pipeline: condition parse,
/// identifier resolution, matcher lowering.
pub fn compile_tree(handle: RuleHandle) -> Result<Tree, CompileError> {
    if handle.multipart {
        return Err(CompileError::MultipartRule);
    }

    let condition = match handle.rule.detection.condition() {
        None => return Err(CompileError::MissingCondition),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(CompileError::UnsupportedToken(
                "condition must be a single string".to_string(),
            ));
        }
    };

    let expr = parse_condition(&condition).map_err(|e| CompileError::Condition(e.to_string()))?;

    let ctx = Ctx {
        detection: &handle.rule.detection,
        collapse: !handle.no_collapse_ws,
    };
    let root = compile_expr(&expr, &ctx)?;

    Ok(Tree { root, rule: handle })
}

struct Ctx<'a> {
    detection: &'a Detection,
    collapse: bool,
}

fn compile_expr(expr: &ConditionExpr, ctx: &Ctx<'_>) -> Result<Node, CompileError> {
    match expr {
        ConditionExpr::And(children) => Ok(Node::And(
            children
                .iter()
                .map(|c| compile_expr(c, ctx))
                .collect::<Result<_, _>>()?,
        )),
        ConditionExpr::Or(children) => Ok(Node::Or(
            children
                .iter()
                .map(|c| compile_expr(c, ctx))
                .collect::<Result<_, _>>()?,
        )),
        ConditionExpr::Not(child) => Ok(Node::Not(Box::new(compile_expr(child, ctx)?))),
        ConditionExpr::Identifier(name) => compile_identifier(name, ctx),
        ConditionExpr::Selector {
            quantifier,
            pattern,
        } => compile_selector(quantifier, pattern, ctx),
    }
}

fn compile_identifier(name: &str, ctx: &Ctx<'_>) -> Result<Node, CompileError> {
    let spec = ctx
        .detection
        .identifier(name)
        .ok_or_else(|| CompileError::UndefinedIdentifier(name.to_string()))?;
    Ok(Node::Ident {
        name: name.to_string(),
        body: Box::new(compile_spec(spec, ctx)?),
    })
}

/// Expand a quantified selector into its resolved identifier group.
///
/// Expansion order follows the detection map's sorted iteration, so the
/// compiled branch order is deterministic. An empty expansion is a compile
/// error, never a silent non-match.
fn compile_selector(
    quantifier: &Quantifier,
    pattern: &SelectorPattern,
    ctx: &Ctx<'_>,
) -> Result<Node, CompileError> {
    let names: Vec<&str> = match pattern {
        SelectorPattern::Them => ctx.detection.identifiers().map(|(k, _)| k).collect(),
        SelectorPattern::Pattern(p) => {
            let parts = glob_parts(p);
            let re = Regex::new(&glob_to_regex(&parts, false))?;
            ctx.detection
                .identifiers()
                .map(|(k, _)| k)
                .filter(|k| re.is_match(k))
                .collect()
        }
    };

    if names.is_empty() {
        return Err(CompileError::EmptyExpansion(pattern.to_string()));
    }

    let branches: Vec<Node> = names
        .iter()
        .map(|name| compile_identifier(name, ctx))
        .collect::<Result<_, _>>()?;

    let threshold = match quantifier {
        Quantifier::Any => Threshold::AtLeast(1),
        Quantifier::All => Threshold::All,
        Quantifier::Count(0) => {
            return Err(CompileError::MalformedQuantifier(
                "0 of".to_string(),
            ));
        }
        Quantifier::Count(n) => {
            if *n as usize > branches.len() {
                return Err(CompileError::QuantifierOutOfRange {
                    count: *n,
                    size: branches.len(),
                });
            }
            Threshold::AtLeast(*n as usize)
        }
    };

    Ok(Node::OfThese {
        threshold,
        branches,
    })
}

// ---------------------------------------------------------------------------
// Matcher specification lowering
// ---------------------------------------------------------------------------

/// Compile one named search identifier's raw specification.
///
/// - Mapping: AND across fields, OR across each field's value list
/// - Sequence of mappings: OR across the sub-specifications
/// - Sequence of scalars (or a bare scalar): free-text keyword OR
fn compile_spec(spec: &Value, ctx: &Ctx<'_>) -> Result<Node, CompileError> {
    match spec {
        Value::Mapping(map) => {
            let mut items = Vec::with_capacity(map.len());
            for (key, value) in map {
                let key = key.as_str().ok_or_else(|| {
                    CompileError::InvalidSpec("field name must be a string".to_string())
                })?;
                items.push(compile_field_entry(key, value, ctx)?);
            }
            if items.is_empty() {
                return Err(CompileError::InvalidSpec(
                    "empty search identifier".to_string(),
                ));
            }
            Ok(unwrap_single(items, Node::And))
        }
        Value::Sequence(seq) => {
            if seq.is_empty() {
                return Err(CompileError::InvalidSpec(
                    "empty search identifier".to_string(),
                ));
            }
            if seq.iter().all(|v| v.is_mapping()) {
                let subs: Vec<Node> = seq
                    .iter()
                    .map(|v| compile_spec(v, ctx))
                    .collect::<Result<_, _>>()?;
                Ok(unwrap_single(subs, Node::Or))
            } else {
                compile_keywords(seq, ctx)
            }
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            compile_keywords(std::slice::from_ref(spec), ctx)
        }
        _ => Err(CompileError::InvalidSpec(
            "search identifier must be a mapping, list, or scalar".to_string(),
        )),
    }
}

fn unwrap_single(mut nodes: Vec<Node>, ctor: fn(Vec<Node>) -> Node) -> Node {
    if nodes.len() == 1 {
        nodes.swap_remove(0)
    } else {
        ctor(nodes)
    }
}

/// One `field: value(s)` entry inside a mapping specification.
///
/// The key may carry pipe modifiers (`CommandLine|contains`). The special
/// `keyword`/`keywords` pseudo-field routes to free-text matching.
fn compile_field_entry(key: &str, value: &Value, ctx: &Ctx<'_>) -> Result<Node, CompileError> {
    let (field, mods) = parse_field_key(key)?;

    if field.eq_ignore_ascii_case("keyword") || field.eq_ignore_ascii_case("keywords") {
        let values = value_list(value);
        return compile_keywords(values, ctx);
    }

    let values = value_list(value);
    if values.is_empty() {
        return Err(CompileError::InvalidSpec(format!(
            "field '{field}' has no values"
        )));
    }

    let mut matchers: Vec<ValueMatcher> = values
        .iter()
        .map(|v| compile_field_value(v, &mods, ctx))
        .collect::<Result<_, _>>()?;

    let matcher = if matchers.len() == 1 {
        matchers.swap_remove(0)
    } else if mods.all {
        ValueMatcher::AllOf(matchers)
    } else {
        ValueMatcher::AnyOf(matchers)
    };

    Ok(Node::Field { field, matcher })
}

fn value_list(value: &Value) -> &[Value] {
    match value {
        Value::Sequence(seq) => seq.as_slice(),
        other => std::slice::from_ref(other),
    }
}

/// Free-text keyword leaf: plain literals match as case-insensitive
/// substrings, wildcards switch to anchored glob semantics.
fn compile_keywords(values: &[Value], ctx: &Ctx<'_>) -> Result<Node, CompileError> {
    if values.is_empty() {
        return Err(CompileError::InvalidSpec("empty keyword list".to_string()));
    }
    let matchers: Vec<ValueMatcher> = values
        .iter()
        .map(|v| compile_keyword_value(v, ctx))
        .collect::<Result<_, _>>()?;
    Ok(Node::Keywords(matchers))
}

fn compile_keyword_value(value: &Value, ctx: &Ctx<'_>) -> Result<ValueMatcher, CompileError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            return Err(CompileError::InvalidSpec(
                "keyword values must be scalars".to_string(),
            ));
        }
    };

    let parts = glob_parts(&text);
    if has_wildcards(&parts) {
        matcher_from_parts(parts, true, ctx.collapse)
    } else {
        // Free-text search: a plain keyword matches anywhere in the string.
        matcher_from_parts(wrap_stars(parts), true, ctx.collapse)
    }
}

// ---------------------------------------------------------------------------
// Field value lowering
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct Mods {
    contains: bool,
    startswith: bool,
    endswith: bool,
    re: bool,
    all: bool,
    cmp: Option<Cmp>,
}

#[derive(Debug, Clone, Copy)]
enum Cmp {
    Gt,
    Gte,
    Lt,
    Lte,
}

fn parse_field_key(key: &str) -> Result<(String, Mods), CompileError> {
    let mut iter = key.split('|');
    let field = iter.next().unwrap_or_default().to_string();
    let mut mods = Mods::default();
    for m in iter {
        match m {
            "contains" => mods.contains = true,
            "startswith" => mods.startswith = true,
            "endswith" => mods.endswith = true,
            "re" => mods.re = true,
            "all" => mods.all = true,
            "gt" => mods.cmp = Some(Cmp::Gt),
            "gte" => mods.cmp = Some(Cmp::Gte),
            "lt" => mods.cmp = Some(Cmp::Lt),
            "lte" => mods.cmp = Some(Cmp::Lte),
            other => {
                return Err(CompileError::UnsupportedToken(format!(
                    "field modifier '{other}'"
                )));
            }
        }
    }
    Ok((field, mods))
}

fn compile_field_value(
    value: &Value,
    mods: &Mods,
    ctx: &Ctx<'_>,
) -> Result<ValueMatcher, CompileError> {
    // |re takes the value verbatim as a search regex.
    if mods.re {
        let pattern = value.as_str().ok_or_else(|| {
            CompileError::InvalidSpec("re modifier requires a string value".to_string())
        })?;
        return Ok(ValueMatcher::Regex {
            regex: Regex::new(pattern)?,
            collapse_ws: false,
        });
    }

    // Ordered numeric comparisons.
    if let Some(cmp) = mods.cmp {
        let n = numeric_value(value)?;
        return Ok(match cmp {
            Cmp::Gt => ValueMatcher::NumericGt(n),
            Cmp::Gte => ValueMatcher::NumericGte(n),
            Cmp::Lt => ValueMatcher::NumericLt(n),
            Cmp::Lte => ValueMatcher::NumericLte(n),
        });
    }

    match value {
        Value::Number(n) => {
            if mods.contains || mods.startswith || mods.endswith {
                compile_text_value(&n.to_string(), mods, ctx)
            } else {
                Ok(ValueMatcher::NumericEq(n.as_f64().ok_or_else(|| {
                    CompileError::InvalidSpec(format!("non-finite number: {n}"))
                })?))
            }
        }
        Value::Bool(b) => Ok(ValueMatcher::BoolEq(*b)),
        Value::Null => Ok(ValueMatcher::Null),
        Value::String(s) => {
            // `/pattern/` is a regex literal when no string modifier asks
            // for something else.
            if s.len() > 1 && s.starts_with('/') && s.ends_with('/') {
                return Ok(ValueMatcher::Regex {
                    regex: Regex::new(&s[1..s.len() - 1])?,
                    collapse_ws: false,
                });
            }
            compile_text_value(s, mods, ctx)
        }
        _ => Err(CompileError::InvalidSpec(
            "field values must be scalars".to_string(),
        )),
    }
}

fn numeric_value(value: &Value) -> Result<f64, CompileError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            CompileError::InvalidSpec(format!("non-finite number: {n}"))
        }),
        Value::String(s) => s.parse::<f64>().map_err(|_| {
            CompileError::InvalidSpec(format!("numeric comparison against non-number '{s}'"))
        }),
        _ => Err(CompileError::InvalidSpec(
            "numeric comparison requires a number".to_string(),
        )),
    }
}

/// Lower a string literal (with optional string modifier) into a matcher.
///
/// The literal's glob shape picks the cheapest mode: bare literals compare
/// exactly, `*x*` / `x*` / `*x` become contains / prefix / suffix, and
/// anything with interior wildcards compiles to an anchored regex.
fn compile_text_value(
    text: &str,
    mods: &Mods,
    ctx: &Ctx<'_>,
) -> Result<ValueMatcher, CompileError> {
    let mut parts = glob_parts(text);

    if mods.contains {
        parts = wrap_stars(parts);
    } else if mods.startswith {
        parts = append_star(parts);
    } else if mods.endswith {
        parts = prepend_star(parts);
    }

    matcher_from_parts(parts, false, ctx.collapse)
}

fn wrap_stars(parts: Vec<GlobPart>) -> Vec<GlobPart> {
    prepend_star(append_star(parts))
}

fn prepend_star(mut parts: Vec<GlobPart>) -> Vec<GlobPart> {
    if !matches!(parts.first(), Some(GlobPart::Star)) {
        parts.insert(0, GlobPart::Star);
    }
    parts
}

fn append_star(mut parts: Vec<GlobPart>) -> Vec<GlobPart> {
    if !matches!(parts.last(), Some(GlobPart::Star)) {
        parts.push(GlobPart::Star);
    }
    parts
}

/// Classify tokenized glob parts into the cheapest matcher mode.
fn matcher_from_parts(
    parts: Vec<GlobPart>,
    case_insensitive: bool,
    collapse: bool,
) -> Result<ValueMatcher, CompileError> {
    let prep = |t: &str| -> String {
        let t = if collapse {
            collapse_ws(t).into_owned()
        } else {
            t.to_string()
        };
        if case_insensitive {
            t.to_ascii_lowercase()
        } else {
            t
        }
    };

    Ok(match parts.as_slice() {
        [] => ValueMatcher::Exact {
            value: String::new(),
            case_insensitive,
            collapse_ws: collapse,
        },
        [GlobPart::Plain(t)] => ValueMatcher::Exact {
            value: prep(t),
            case_insensitive,
            collapse_ws: collapse,
        },
        [GlobPart::Star] => ValueMatcher::Contains {
            value: String::new(),
            case_insensitive,
            collapse_ws: collapse,
        },
        [GlobPart::Star, GlobPart::Plain(t), GlobPart::Star] => ValueMatcher::Contains {
            value: prep(t),
            case_insensitive,
            collapse_ws: collapse,
        },
        [GlobPart::Plain(t), GlobPart::Star] => ValueMatcher::StartsWith {
            value: prep(t),
            case_insensitive,
            collapse_ws: collapse,
        },
        [GlobPart::Star, GlobPart::Plain(t)] => ValueMatcher::EndsWith {
            value: prep(t),
            case_insensitive,
            collapse_ws: collapse,
        },
        _ => {
            // Collapse plain runs before regex conversion so normalization
            // stays consistent with the direct modes.
            let parts: Vec<GlobPart> = parts
                .into_iter()
                .map(|p| match p {
                    GlobPart::Plain(t) => GlobPart::Plain(prep(&t)),
                    other => other,
                })
                .collect();
            ValueMatcher::Regex {
                regex: Regex::new(&glob_to_regex(&parts, case_insensitive))?,
                collapse_ws: collapse,
            }
        }
    })
}
