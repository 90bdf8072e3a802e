// ── Hierarchy template configuration ──
//
// The parsed, immutable form of a template record. Built once per
// template name by the metadata loader and shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::enrich::Enricher;
use crate::model::response::QueryParams;

/// Sibling ordering direction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    #[strum(to_string = "Asc", serialize = "Ascending")]
    Ascending,
    #[strum(to_string = "Desc", serialize = "Descending")]
    Descending,
}

/// Field and direction used by the hierarchy sorter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

/// One column of the grid, in the platform's column-description shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub field_name: String,
    #[serde(default)]
    pub label: String,
    /// Renderer type hint (`text`, `url`, `number`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_attributes: Option<serde_json::Value>,
}

impl ColumnSpec {
    /// Field whose value should be displayed for this column.
    ///
    /// URL columns carry their visible text in
    /// `typeAttributes.label.fieldName`; everything else shows its own field.
    pub fn display_field(&self) -> &str {
        self.type_attributes
            .as_ref()
            .and_then(|attrs| attrs.pointer("/label/fieldName"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&self.field_name)
    }

    pub fn heading(&self) -> &str {
        if self.label.is_empty() {
            &self.field_name
        } else {
            &self.label
        }
    }
}

/// Parsed template: layout, icons, query shape, sort rule, enrichment.
#[derive(Clone)]
pub struct HierarchyConfig {
    pub template_name: String,
    pub template_label: String,
    pub header_icon: Option<String>,
    pub record_icon: Option<String>,
    pub object_name: Option<String>,
    pub root_field_name: Option<String>,
    pub parent_field_name: Option<String>,
    pub fields_to_query: Vec<String>,
    pub sort: Option<SortSpec>,
    pub columns: Vec<ColumnSpec>,
    /// Original rule text, kept for display.
    pub rule_text: Option<String>,
    pub enricher: Option<Arc<dyn Enricher>>,
}

impl HierarchyConfig {
    /// Query parameters for fetching the hierarchy rooted at `record_id`.
    pub fn query_params(&self, record_id: Option<&str>) -> QueryParams {
        QueryParams {
            object_name: self.object_name.clone(),
            record_id: record_id.map(str::to_owned),
            root_field_name: self.root_field_name.clone(),
            parent_field_name: self.parent_field_name.clone(),
            fields_to_query: self.fields_to_query.clone(),
        }
    }
}

impl fmt::Debug for HierarchyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyConfig")
            .field("template_name", &self.template_name)
            .field("template_label", &self.template_label)
            .field("object_name", &self.object_name)
            .field("fields_to_query", &self.fields_to_query)
            .field("sort", &self.sort)
            .field("columns", &self.columns.len())
            .field("rule_text", &self.rule_text)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn sort_direction_parses_platform_spellings() {
        assert_eq!(SortDirection::from_str("Asc").ok(), Some(SortDirection::Ascending));
        assert_eq!(SortDirection::from_str("desc").ok(), Some(SortDirection::Descending));
        assert_eq!(
            SortDirection::from_str("DESCENDING").ok(),
            Some(SortDirection::Descending)
        );
        assert!(SortDirection::from_str("sideways").is_err());
        assert_eq!(SortDirection::Descending.to_string(), "Desc");
    }

    #[test]
    fn url_columns_display_their_label_field() {
        let column: ColumnSpec = serde_json::from_value(json!({
            "type": "url",
            "fieldName": "recordUrl",
            "label": "Account",
            "typeAttributes": { "label": { "fieldName": "Name" }, "target": "_self" }
        }))
        .expect("column should parse");

        assert_eq!(column.display_field(), "Name");
        assert_eq!(column.heading(), "Account");
        assert_eq!(column.column_type.as_deref(), Some("url"));
    }
}
