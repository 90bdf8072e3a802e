// ── Hierarchy request and response ──

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use arbor_api::HierarchyQuery;

use crate::error::CoreError;
use crate::model::node::{NodeId, RawNode};

/// Parameters of one hierarchy retrieval, derived from the template and
/// the caller's record id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub object_name: Option<String>,
    pub record_id: Option<String>,
    pub root_field_name: Option<String>,
    pub parent_field_name: Option<String>,
    pub fields_to_query: Vec<String>,
}

impl QueryParams {
    /// Check required parameters and build the wire query.
    ///
    /// Object name, record id, and at least one field are required;
    /// the root and parent field names are passed through when present.
    pub fn to_query(&self) -> Result<HierarchyQuery, CoreError> {
        let object_name = required(self.object_name.as_deref(), "object name")?;
        let record_id = required(self.record_id.as_deref(), "record id")?;

        let fields: Vec<&str> = self
            .fields_to_query
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(CoreError::InvalidQueryParams {
                reason: "at least one field to query is required".into(),
            });
        }

        Ok(HierarchyQuery {
            s_object_api_name: object_name.to_owned(),
            record_id: record_id.to_owned(),
            root_field_api_name: non_blank(self.root_field_name.as_deref()),
            parent_field_api_name: non_blank(self.parent_field_name.as_deref()),
            fields_to_query: fields.join(","),
        })
    }
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, CoreError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::InvalidQueryParams {
            reason: format!("{what} is required"),
        }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// One hierarchy retrieval result: top-level records plus a
/// parent-id -> children mapping, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyResponse {
    pub total_count: u64,
    pub base_url: String,
    pub root_nodes: Vec<RawNode>,
    pub children_by_parent_id: IndexMap<String, Vec<RawNode>>,
}

impl HierarchyResponse {
    pub fn children_of(&self, parent: &NodeId) -> Option<&[RawNode]> {
        self.children_by_parent_id
            .get(parent.as_str())
            .map(Vec::as_slice)
    }
}
