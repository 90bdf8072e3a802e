// Wire types for the platform's template and hierarchy endpoints.
//
// Field names follow the platform's camelCase JSON. Nothing here
// interprets the data -- parsing columns, rules, and sort settings is
// `arbor-core`'s job.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One untyped record as returned by the platform: field name -> scalar.
pub type RawRecord = IndexMap<String, serde_json::Value>;

/// A hierarchy template record, as stored in platform metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    /// Display label of the template; used as the header title.
    pub master_label: String,
    #[serde(default)]
    pub header_icon_name: Option<String>,
    #[serde(default)]
    pub record_icon_name: Option<String>,
    /// Column layout for the grid, stored by the platform as a JSON string.
    #[serde(default)]
    pub column_structure: Option<String>,
    #[serde(default)]
    pub object_api_name: Option<String>,
    /// Comma-separated field list.
    #[serde(default)]
    pub fields_to_query: Option<String>,
    #[serde(default)]
    pub root_field_api_name: Option<String>,
    #[serde(default)]
    pub parent_field_api_name: Option<String>,
    #[serde(default)]
    pub default_sort_by_field: Option<String>,
    /// `"Asc"` or `"Desc"` in practice; free text on the wire.
    #[serde(default)]
    pub default_sort_direction: Option<String>,
    /// Node enrichment rule text.
    #[serde(default)]
    pub record_structure: Option<String>,
}

/// Request body for `POST /api/hierarchy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyQuery {
    #[serde(rename = "sObjectApiName")]
    pub s_object_api_name: String,
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_field_api_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_field_api_name: Option<String>,
    /// Comma-separated, as the platform expects.
    pub fields_to_query: String,
}

/// Response body of `POST /api/hierarchy`.
///
/// `super_parent_list` holds the top-level records; `parent_map` maps a
/// parent identifier to its direct children in backend order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyPayload {
    #[serde(default)]
    pub total_record_count: u64,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub super_parent_list: Vec<RawRecord>,
    #[serde(default)]
    pub parent_map: IndexMap<String, Vec<RawRecord>>,
}
