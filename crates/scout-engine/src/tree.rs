//! Compiled rule trees and their evaluation.
//!
//! A [`Tree`] is the compiled form of one rule: a root [`Node`] plus the
//! originating handle for reporting. Trees never mutate after compilation
//! and are safe for unlimited concurrent reads.

use scout_rule::RuleHandle;

use crate::event::Event;
use crate::matcher::ValueMatcher;
use crate::result::RuleResult;

/// Counting policy of a quantified identifier group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// At least N branches must match (`N of`, `1 of`, `any of`).
    AtLeast(usize),
    /// Every branch must match (`all of`).
    All,
}

/// A compiled condition node.
///
/// Evaluation dispatches on the variant in one exhaustive match; AND/OR
/// short-circuit, quantified groups stop early once the threshold is
/// satisfied or unreachable.
#[derive(Debug, Clone)]
pub enum Node {
    /// Ordered conjunction; false on the first false child.
    And(Vec<Node>),
    /// Ordered disjunction; true on the first true child.
    Or(Vec<Node>),
    /// Negation of exactly one child.
    Not(Box<Node>),
    /// A named search identifier resolved to its compiled block.
    /// The name is kept for diagnostics only.
    Ident { name: String, body: Box<Node> },
    /// Quantified identifier group (`N of selection_*`, `all of them`).
    OfThese {
        threshold: Threshold,
        branches: Vec<Node>,
    },
    /// Field matcher leaf. An absent field is false, never an error.
    Field {
        field: String,
        matcher: ValueMatcher,
    },
    /// Free-text keyword leaf: any keyword string matching any matcher.
    Keywords(Vec<ValueMatcher>),
}

impl Node {
    /// Evaluate this node against an event.
    pub fn eval<E: Event + ?Sized>(&self, event: &E) -> bool {
        match self {
            Node::And(children) => children.iter().all(|n| n.eval(event)),
            Node::Or(children) => children.iter().any(|n| n.eval(event)),
            Node::Not(child) => !child.eval(event),
            Node::Ident { body, .. } => body.eval(event),
            Node::OfThese {
                threshold,
                branches,
            } => match threshold {
                Threshold::All => branches.iter().all(|n| n.eval(event)),
                Threshold::AtLeast(n) => {
                    let mut hits = 0usize;
                    let mut remaining = branches.len();
                    for branch in branches {
                        remaining -= 1;
                        if branch.eval(event) {
                            hits += 1;
                            if hits >= *n {
                                return true;
                            }
                        }
                        if hits + remaining < *n {
                            return false;
                        }
                    }
                    hits >= *n
                }
            },
            Node::Field { field, matcher } => match event.select(field) {
                Some(value) => matcher.matches(&value),
                None => false,
            },
            Node::Keywords(matchers) => match event.keywords() {
                Some(keywords) => keywords
                    .iter()
                    .any(|k| matchers.iter().any(|m| m.matches_str(k))),
                None => false,
            },
        }
    }
}

/// A compiled rule: root node plus the rule it came from.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: Node,
    pub rule: RuleHandle,
}

impl Tree {
    /// Evaluate the tree against one event.
    ///
    /// Returns the rule's identity on a true root, `None` otherwise.
    /// Never mutates the tree or the event, and never fails.
    pub fn eval<E: Event + ?Sized>(&self, event: &E) -> Option<RuleResult> {
        if self.root.eval(event) {
            Some(RuleResult::from_handle(&self.rule))
        } else {
            None
        }
    }
}
