// ── Tree assembly ──
//
// Walks the parent -> children mapping from the top-level records,
// enriching each record on the way and attaching children in backend
// order. Every record is placed at most once: a child that is its own
// ancestor cuts the branch, a record reachable twice keeps its first
// position. Both are reported, never fatal. The walk keeps its own stack
// of open parents, so chain depth is bounded by memory, not call depth.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostics::DiagnosticSink;
use crate::enrich::{EnrichContext, Enricher, enrich_node};
use crate::error::{CoreError, HierarchyFault};
use crate::model::{CHILDREN_FIELD, EnrichedNode, HierarchyResponse, NodeId, RawNode, Tree};

type ChildMap = IndexMap<String, Vec<RawNode>>;

/// An assembled, not yet sorted, forest plus response pass-through.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTree {
    pub tree: Tree,
    pub total_count: u64,
    pub base_url: String,
    pub node_count: usize,
}

/// Builds a [`Tree`] from one [`HierarchyResponse`].
pub struct TreeAssembler<'a> {
    primary_key: &'a str,
    enricher: Option<&'a dyn Enricher>,
    sink: &'a dyn DiagnosticSink,
}

#[derive(Default)]
struct WalkState {
    /// Raw keys of the open parents of the node being expanded.
    path: HashSet<NodeId>,
    /// Raw keys of every node placed so far.
    placed: HashSet<NodeId>,
    /// Mapping keys that were looked up.
    reached: HashSet<String>,
}

/// A parent whose children are still being attached.
struct Frame<'m> {
    node: EnrichedNode,
    raw_id: NodeId,
    children: &'m [RawNode],
    next: usize,
}

enum Opened<'m> {
    Leaf(EnrichedNode),
    Branch(Frame<'m>),
}

impl<'a> TreeAssembler<'a> {
    pub fn new(primary_key: &'a str, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            primary_key,
            enricher: None,
            sink,
        }
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: Option<&'a dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn assemble(&self, response: HierarchyResponse) -> AssembledTree {
        let HierarchyResponse {
            total_count,
            base_url,
            root_nodes,
            children_by_parent_id,
        } = response;

        let ctx = EnrichContext {
            base_url: &base_url,
            primary_key_field: self.primary_key,
        };
        let mut state = WalkState::default();
        let mut roots = Vec::with_capacity(root_nodes.len());

        for raw in &root_nodes {
            if let Some(id) = raw.id(self.primary_key) {
                if state.placed.contains(&id) {
                    self.fault(HierarchyFault::Duplicate { node_id: id });
                    continue;
                }
            }
            roots.push(self.attach(raw, &children_by_parent_id, &ctx, &mut state));
        }

        for (parent_id, orphans) in &children_by_parent_id {
            if !state.reached.contains(parent_id) && !orphans.is_empty() {
                self.fault(HierarchyFault::DanglingParent {
                    parent_id: parent_id.clone(),
                    orphans: orphans.len(),
                });
            }
        }

        let tree = Tree::new(roots);
        let node_count = tree.node_count();
        debug!(
            roots = tree.roots().len(),
            node_count, total_count, "hierarchy assembled"
        );

        AssembledTree {
            tree,
            total_count,
            base_url,
            node_count,
        }
    }

    /// Build the subtree under one top-level record.
    fn attach<'m>(
        &self,
        raw: &RawNode,
        mapping: &'m ChildMap,
        ctx: &EnrichContext<'_>,
        state: &mut WalkState,
    ) -> EnrichedNode {
        let mut current = match self.open(raw, mapping, ctx, state) {
            Opened::Leaf(node) => return node,
            Opened::Branch(frame) => frame,
        };
        let mut parents: Vec<Frame<'m>> = Vec::new();

        loop {
            if let Some(child) = self.next_child(&mut current, state) {
                match self.open(child, mapping, ctx, state) {
                    Opened::Leaf(node) => current.node.push_child(node),
                    Opened::Branch(frame) => parents.push(std::mem::replace(&mut current, frame)),
                }
                continue;
            }

            state.path.remove(&current.raw_id);
            match parents.pop() {
                Some(mut parent) => {
                    parent.node.push_child(current.node);
                    current = parent;
                }
                None => return current.node,
            }
        }
    }

    /// Enrich one record and, when it has listed children, open it as a
    /// parent.
    fn open<'m>(
        &self,
        raw: &RawNode,
        mapping: &'m ChildMap,
        ctx: &EnrichContext<'_>,
        state: &mut WalkState,
    ) -> Opened<'m> {
        let mut node = enrich_node(raw, self.enricher, ctx, self.sink);
        if node.remove_field(CHILDREN_FIELD).is_some() {
            self.fault(HierarchyFault::ReservedField {
                node_id: raw.id(self.primary_key).unwrap_or_else(NodeId::unknown),
                field: CHILDREN_FIELD.to_owned(),
            });
        }

        let Some(raw_id) = raw.id(self.primary_key) else {
            self.fault(HierarchyFault::MissingPrimaryKey {
                field: self.primary_key.to_owned(),
            });
            return Opened::Leaf(node);
        };
        state.placed.insert(raw_id.clone());

        // Children are keyed by the enriched record's key.
        let lookup = node.id(self.primary_key).unwrap_or_else(|| raw_id.clone());
        let Some(children) = mapping.get(lookup.as_str()) else {
            return Opened::Leaf(node);
        };
        state.reached.insert(lookup.as_str().to_owned());
        state.path.insert(raw_id.clone());

        Opened::Branch(Frame {
            node,
            raw_id,
            children,
            next: 0,
        })
    }

    /// The next child of `frame` that may be placed, reporting the ones
    /// that may not.
    fn next_child<'m>(&self, frame: &mut Frame<'m>, state: &WalkState) -> Option<&'m RawNode> {
        let children = frame.children;
        while let Some(child) = children.get(frame.next) {
            frame.next += 1;
            if let Some(child_id) = child.id(self.primary_key) {
                if state.path.contains(&child_id) {
                    self.fault(HierarchyFault::Cycle {
                        node_id: child_id,
                        parent_id: frame.raw_id.clone(),
                    });
                    continue;
                }
                if state.placed.contains(&child_id) {
                    self.fault(HierarchyFault::Duplicate { node_id: child_id });
                    continue;
                }
            }
            return Some(child);
        }
        None
    }

    fn fault(&self, fault: HierarchyFault) {
        self.sink.report(&CoreError::MalformedHierarchy(fault));
    }
}
