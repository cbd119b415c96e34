//! Event capability interfaces and the JSON event adapter.
//!
//! The evaluator never assumes a concrete event shape. It requires exactly
//! two capabilities: field lookup ([`Selector`]) and keyword extraction
//! ([`Keyworder`]). Any caller-supplied type implementing both is evaluable.

use std::borrow::Cow;

use serde_json::Value;

/// Field lookup capability.
pub trait Selector {
    /// Look up a field by name. `None` means the event has no such field;
    /// an absent field is never an error, it simply fails to match.
    fn select(&self, field: &str) -> Option<Cow<'_, Value>>;
}

/// Keyword extraction capability.
pub trait Keyworder {
    /// The strings eligible for free-text keyword matching.
    /// `None` means the event exposes no keyword source.
    fn keywords(&self) -> Option<Vec<Cow<'_, str>>>;
}

/// The full capability set the evaluator needs from an event.
pub trait Event: Selector + Keyworder {}

impl<T: Selector + Keyworder + ?Sized> Event for T {}

/// JSON event adapter with dot-notation field access.
///
/// Flat keys take precedence: `"actor.id"` as a single key wins over
/// `{"actor": {"id": ...}}` nested traversal. Keywords are every string
/// value found anywhere in the event.
#[derive(Debug, Clone, Copy)]
pub struct DynamicEvent<'a> {
    inner: &'a Value,
}

impl<'a> DynamicEvent<'a> {
    /// Wrap a JSON value as an event.
    pub fn from_value(value: &'a Value) -> Self {
        DynamicEvent { inner: value }
    }

    /// Access the underlying JSON value.
    pub fn as_value(&self) -> &'a Value {
        self.inner
    }
}

impl Selector for DynamicEvent<'_> {
    fn select(&self, field: &str) -> Option<Cow<'_, Value>> {
        // Flat key check first
        if let Some(obj) = self.inner.as_object() {
            if let Some(v) = obj.get(field) {
                return Some(Cow::Borrowed(v));
            }
        }

        // Dot-notation traversal
        if field.contains('.') {
            let parts: Vec<&str> = field.split('.').collect();
            return traverse(self.inner, &parts).map(Cow::Borrowed);
        }

        None
    }
}

impl Keyworder for DynamicEvent<'_> {
    fn keywords(&self) -> Option<Vec<Cow<'_, str>>> {
        let mut values = Vec::new();
        collect_string_values(self.inner, &mut values);
        Some(values.into_iter().map(Cow::Borrowed).collect())
    }
}

/// Follow dot-notation path segments into a JSON value.
///
/// Arrays are transparent: each element is tried against the remaining
/// path and the first hit wins.
fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let (head, rest) = match parts.split_first() {
        Some(split) => split,
        None => return Some(current),
    };

    match current {
        Value::Object(map) => traverse(map.get(*head)?, rest),
        Value::Array(items) => items.iter().find_map(|item| traverse(item, parts)),
        _ => None,
    }
}

fn collect_string_values<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Object(map) => map.values().for_each(|v| collect_string_values(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_string_values(v, out)),
        _ => {}
    }
}
