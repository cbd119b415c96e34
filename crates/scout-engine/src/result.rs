//! Match result types emitted by tree evaluation.

use scout_rule::RuleHandle;
use serde::Serialize;

/// Identity of a rule that matched an event, emitted once per matching
/// tree per evaluated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl RuleResult {
    pub(crate) fn from_handle(handle: &RuleHandle) -> Self {
        RuleResult {
            id: handle.rule.id.clone(),
            title: handle.rule.title.clone(),
            description: handle.rule.description.clone(),
            tags: handle.rule.tags.clone(),
        }
    }
}

/// Ordered matches for one event; order follows the ruleset's rule order.
pub type Results = Vec<RuleResult>;
