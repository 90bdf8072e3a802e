use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assemble::AssembledTree;
use crate::model::node::Tree;
use crate::model::template::{ColumnSpec, HierarchyConfig};

/// Everything the presentation layer needs to draw one built hierarchy.
///
/// Built wholesale on every fetch or refresh and never patched.
#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    /// Request epoch that produced this snapshot.
    pub epoch: u64,
    pub title: String,
    pub header_icon: Option<String>,
    pub record_icon: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub total_count: u64,
    pub base_url: String,
    pub node_count: usize,
    pub built_at: DateTime<Utc>,
    pub tree: Tree,
}

impl TreeSnapshot {
    /// Snapshot of an assembled tree under `config`, stamped now.
    pub fn from_parts(epoch: u64, config: &HierarchyConfig, assembled: AssembledTree) -> Self {
        let AssembledTree {
            tree,
            total_count,
            base_url,
            node_count,
        } = assembled;
        Self {
            epoch,
            title: config.template_label.clone(),
            header_icon: config.header_icon.clone(),
            record_icon: config.record_icon.clone(),
            columns: config.columns.clone(),
            total_count,
            base_url,
            node_count,
            built_at: Utc::now(),
            tree,
        }
    }
}
