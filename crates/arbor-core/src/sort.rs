// ── Sibling ordering ──
//
// Stable, depth-first sort of the root list and every children list by
// one field, with the primary key as tie-break so that descending order
// is the exact reverse of ascending. The comparator is a total order over
// JSON scalars: numbers rank before text and compare numerically, text
// compares by root-locale collation (accents secondary, lowercase before
// uppercase) with code points as a final tie-break, and missing or null
// values count as empty text.

use std::borrow::Cow;
use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};
use serde_json::Value;
use tracing::warn;

use crate::diagnostics::DiagnosticSink;
use crate::error::CoreError;
use crate::model::{EnrichedNode, NodeId, SortDirection, SortSpec, Tree};

/// Sort `tree` in place by `spec`.
///
/// Each node lacking the sort field is reported once as `SortFieldMissing`
/// (keyed by `primary_key`) and ordered as if the field were empty.
pub fn sort_tree(tree: &mut Tree, spec: &SortSpec, primary_key: &str, sink: &dyn DiagnosticSink) {
    report_missing(tree, spec, primary_key, sink);

    let order = ValueOrder::new();
    let compare = |a: &EnrichedNode, b: &EnrichedNode| {
        let ord = order
            .compare(a.get(&spec.field), b.get(&spec.field))
            .then_with(|| order.compare(a.get(primary_key), b.get(primary_key)));
        match spec.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    };

    let mut levels = vec![tree.roots_mut()];
    while let Some(level) = levels.pop() {
        level.sort_by(compare);
        levels.extend(level.iter_mut().map(EnrichedNode::children_mut));
    }
}

fn report_missing(tree: &Tree, spec: &SortSpec, primary_key: &str, sink: &dyn DiagnosticSink) {
    for (_, node) in tree.walk() {
        if matches!(node.get(&spec.field), None | Some(Value::Null)) {
            sink.report(&CoreError::SortFieldMissing {
                field: spec.field.clone(),
                node_id: node.id(primary_key).unwrap_or_else(NodeId::unknown),
            });
        }
    }
}

#[derive(Debug, PartialEq)]
enum Key<'a> {
    Number(f64),
    Text(Cow<'a, str>),
}

fn key(value: Option<&Value>) -> Key<'_> {
    match value {
        None | Some(Value::Null) => Key::Text("".into()),
        Some(Value::Number(n)) => n.as_f64().map_or_else(|| Key::Text(n.to_string().into()), Key::Number),
        Some(Value::String(s)) => Key::Text(s.as_str().into()),
        Some(other) => Key::Text(other.to_string().into()),
    }
}

/// Ascending order over field values.
pub struct ValueOrder {
    collator: Option<Collator>,
}

impl ValueOrder {
    /// Root-locale collation at tertiary strength. Falls back to code
    /// point order if collation data cannot be loaded.
    pub fn new() -> Self {
        let collator = match Collator::try_new(&Default::default(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(e) => {
                warn!(error = ?e, "root collation unavailable; sorting text by code point");
                None
            }
        };
        Self { collator }
    }

    pub fn compare(&self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (key(a), key(b)) {
            (Key::Number(x), Key::Number(y)) => x.total_cmp(&y),
            (Key::Number(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Number(_)) => Ordering::Greater,
            (Key::Text(x), Key::Text(y)) => self.compare_text(&x, &y),
        }
    }

    fn compare_text(&self, a: &str, b: &str) -> Ordering {
        let collated = self
            .collator
            .as_ref()
            .map_or(Ordering::Equal, |c| c.compare(a, b));
        collated.then_with(|| a.cmp(b))
    }
}

impl Default for ValueOrder {
    fn default() -> Self {
        Self::new()
    }
}
