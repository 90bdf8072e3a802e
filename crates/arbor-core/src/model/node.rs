// ── Hierarchy node types ──
//
// Raw records come from the platform as untyped field maps. Enriched
// nodes add derived display fields and an ordered child list. A node's
// `children` key exists only when it has at least one child.
//
// Hierarchies can be arbitrarily deep, so nothing here recurses per
// level: traversal, cloning, comparison and drop all use explicit stacks.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered field name -> value map.
pub type FieldMap = IndexMap<String, Value>;

/// Default primary-key field name.
pub const DEFAULT_PRIMARY_KEY: &str = "Id";

/// Serialized key holding a node's child list. Records may not use it.
pub const CHILDREN_FIELD: &str = "children";

// ── NodeId ──────────────────────────────────────────────────────────

/// A node's primary-key value rendered as text.
///
/// Strings are taken verbatim, numbers and booleans through their JSON
/// text. Null, arrays, and objects are not usable identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder used in diagnostics for nodes without a usable key.
    pub fn unknown() -> Self {
        Self("<no id>".into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── RawNode ─────────────────────────────────────────────────────────

/// One record exactly as the platform returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawNode {
    fields: FieldMap,
}

impl RawNode {
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn id(&self, primary_key: &str) -> Option<NodeId> {
        self.fields.get(primary_key).and_then(NodeId::from_value)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }
}

impl From<FieldMap> for RawNode {
    fn from(fields: FieldMap) -> Self {
        Self::new(fields)
    }
}

// ── EnrichedNode ────────────────────────────────────────────────────

/// A raw record plus derived fields and its ordered children.
#[derive(Debug, Default, Serialize)]
pub struct EnrichedNode {
    #[serde(flatten)]
    fields: FieldMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<EnrichedNode>,
}

impl EnrichedNode {
    pub fn new(fields: FieldMap) -> Self {
        Self {
            fields,
            children: Vec::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn id(&self, primary_key: &str) -> Option<NodeId> {
        self.fields.get(primary_key).and_then(NodeId::from_value)
    }

    /// Display text for a field: strings verbatim, other scalars as JSON,
    /// missing or null as empty.
    pub fn text(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn children(&self) -> &[EnrichedNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<EnrichedNode> {
        &mut self.children
    }

    pub(crate) fn push_child(&mut self, child: EnrichedNode) {
        self.children.push(child);
    }

    pub(crate) fn remove_field(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// This node plus every descendant.
    pub fn subtree_len(&self) -> usize {
        self.walk().count()
    }

    /// Pre-order walk of this node and its descendants; this node is
    /// depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk::over(std::slice::from_ref(self))
    }
}

impl Clone for EnrichedNode {
    fn clone(&self) -> Self {
        // The copy under construction always has exactly as many children
        // as have been finished, so its length is the next index to copy.
        let mut parents: Vec<(&Self, Self)> = Vec::new();
        let mut source = self;
        let mut copy = Self::new(self.fields.clone());
        loop {
            if let Some(child) = source.children.get(copy.children.len()) {
                let parent_copy = std::mem::replace(&mut copy, Self::new(child.fields.clone()));
                parents.push((source, parent_copy));
                source = child;
                continue;
            }
            match parents.pop() {
                Some((parent, mut parent_copy)) => {
                    parent_copy.children.push(copy);
                    source = parent;
                    copy = parent_copy;
                }
                None => return copy,
            }
        }
    }
}

impl PartialEq for EnrichedNode {
    fn eq(&self, other: &Self) -> bool {
        // A pre-order sequence of (depth, fields) fixes the shape.
        self.walk()
            .map(|(depth, n)| (depth, &n.fields))
            .eq(other.walk().map(|(depth, n)| (depth, &n.fields)))
    }
}

impl Drop for EnrichedNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

// ── Tree ────────────────────────────────────────────────────────────

/// An ordered forest of enriched roots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tree {
    roots: Vec<EnrichedNode>,
}

impl Tree {
    pub fn new(roots: Vec<EnrichedNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[EnrichedNode] {
        &self.roots
    }

    pub(crate) fn roots_mut(&mut self) -> &mut Vec<EnrichedNode> {
        &mut self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes in the forest.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    /// Pre-order walk yielding `(depth, node)`.
    pub fn walk(&self) -> Walk<'_> {
        Walk::over(&self.roots)
    }
}

/// Pre-order iterator over a [`Tree`] or one subtree.
pub struct Walk<'a> {
    stack: Vec<(usize, &'a EnrichedNode)>,
}

impl<'a> Walk<'a> {
    fn over(nodes: &'a [EnrichedNode]) -> Self {
        Self {
            stack: nodes.iter().rev().map(|n| (0, n)).collect(),
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a EnrichedNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn node_id_from_scalars() {
        assert_eq!(NodeId::from_value(&json!("001A")), Some(NodeId::from("001A")));
        assert_eq!(NodeId::from_value(&json!(42)), Some(NodeId::from("42")));
        assert_eq!(NodeId::from_value(&json!("")), None);
        assert_eq!(NodeId::from_value(&Value::Null), None);
        assert_eq!(NodeId::from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn children_key_only_present_when_non_empty() {
        let mut parent = EnrichedNode::new(fields(json!({"Id": "A"})));
        let leaf = serde_json::to_value(&parent).unwrap();
        assert_eq!(leaf, json!({"Id": "A"}));

        parent.push_child(EnrichedNode::new(fields(json!({"Id": "B"}))));
        let branch = serde_json::to_value(&parent).unwrap();
        assert_eq!(branch, json!({"Id": "A", "children": [{"Id": "B"}]}));
    }

    #[test]
    fn walk_is_pre_order_with_depth() {
        let mut a = EnrichedNode::new(fields(json!({"Id": "A"})));
        let mut b = EnrichedNode::new(fields(json!({"Id": "B"})));
        b.push_child(EnrichedNode::new(fields(json!({"Id": "C"}))));
        a.push_child(b);
        a.push_child(EnrichedNode::new(fields(json!({"Id": "D"}))));
        let tree = Tree::new(vec![a, EnrichedNode::new(fields(json!({"Id": "E"})))]);

        let order: Vec<(usize, String)> = tree.walk().map(|(d, n)| (d, n.text("Id"))).collect();
        assert_eq!(
            order,
            vec![
                (0, "A".into()),
                (1, "B".into()),
                (2, "C".into()),
                (1, "D".into()),
                (0, "E".into()),
            ]
        );
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.roots()[0].subtree_len(), 4);
    }

    #[test]
    fn clone_and_eq_follow_structure() {
        let mut a = EnrichedNode::new(fields(json!({"Id": "A"})));
        let mut b = EnrichedNode::new(fields(json!({"Id": "B"})));
        b.push_child(EnrichedNode::new(fields(json!({"Id": "C"}))));
        a.push_child(b);
        a.push_child(EnrichedNode::new(fields(json!({"Id": "D"}))));

        let copy = a.clone();
        assert_eq!(copy, a);
        assert_eq!(serde_json::to_value(&copy).unwrap(), serde_json::to_value(&a).unwrap());

        // Same pre-order fields, different nesting.
        let mut flat = EnrichedNode::new(fields(json!({"Id": "A"})));
        for id in ["B", "C", "D"] {
            flat.push_child(EnrichedNode::new(fields(json!({"Id": id}))));
        }
        assert_ne!(flat, a);
    }

    fn chain(depth: usize) -> EnrichedNode {
        let mut node = EnrichedNode::new(fields(json!({"Id": depth})));
        for i in (0..depth).rev() {
            let mut parent = EnrichedNode::new(fields(json!({"Id": i})));
            parent.push_child(node);
            node = parent;
        }
        node
    }

    #[test]
    fn deep_chain_clones_compares_and_drops() {
        let root = chain(100_000);
        assert_eq!(root.subtree_len(), 100_001);

        let copy = root.clone();
        assert!(copy == root);
        let tree = Tree::new(vec![copy]);
        assert_eq!(tree.walk().map(|(depth, _)| depth).max(), Some(100_000));
        drop(tree);
        drop(root);
    }
}
