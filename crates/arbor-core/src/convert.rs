// ── API-to-domain conversions ──
//
// Bridges raw `arbor_api` wire types into `arbor_core::model` types.
// Templates are parsed once here: the column JSON string is decoded, the
// field list split, the sort direction normalized, and the enrichment
// rule compiled. Anything that cannot be parsed fails the load.

use std::str::FromStr;

use tracing::warn;

use arbor_api::{HierarchyPayload, TemplateRecord};

use crate::enrich::EnricherRegistry;
use crate::error::CoreError;
use crate::model::{ColumnSpec, HierarchyConfig, HierarchyResponse, RawNode, SortDirection, SortSpec};

// ── Helpers ────────────────────────────────────────────────────────

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Split a comma-separated field list, dropping blanks.
pub fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Interpret free-text sort direction.
///
/// `asc`/`ascending` and `desc`/`descending` in any case; absent means
/// ascending, anything else falls back to ascending with a warning.
pub fn parse_direction(template: &str, raw: Option<&str>) -> SortDirection {
    let Some(text) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return SortDirection::Ascending;
    };
    SortDirection::from_str(text).unwrap_or_else(|_| {
        warn!(
            template,
            direction = text,
            "unrecognized sort direction, using ascending"
        );
        SortDirection::Ascending
    })
}

fn parse_columns(template: &str, raw: Option<&str>) -> Result<Vec<ColumnSpec>, CoreError> {
    let Some(text) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    serde_json::from_str(text).map_err(|e| CoreError::ConfigLoadFailed {
        template: template.to_owned(),
        reason: format!("invalid column structure: {e}"),
    })
}

// ── Template ───────────────────────────────────────────────────────

/// Parse a template record into an immutable [`HierarchyConfig`].
pub fn parse_template(
    name: &str,
    record: TemplateRecord,
    registry: &EnricherRegistry,
) -> Result<HierarchyConfig, CoreError> {
    let columns = parse_columns(name, record.column_structure.as_deref())?;

    let rule_text = non_blank(record.record_structure);
    let enricher = match rule_text.as_deref() {
        Some(text) => registry
            .compile(text)
            .map_err(|e| CoreError::ConfigLoadFailed {
                template: name.to_owned(),
                reason: CoreError::from(e).to_string(),
            })?,
        None => None,
    };

    let sort = non_blank(record.default_sort_by_field).map(|field| SortSpec {
        field,
        direction: parse_direction(name, record.default_sort_direction.as_deref()),
    });

    Ok(HierarchyConfig {
        template_name: name.to_owned(),
        template_label: record.master_label,
        header_icon: non_blank(record.header_icon_name),
        record_icon: non_blank(record.record_icon_name),
        object_name: non_blank(record.object_api_name),
        root_field_name: non_blank(record.root_field_api_name),
        parent_field_name: non_blank(record.parent_field_api_name),
        fields_to_query: record
            .fields_to_query
            .as_deref()
            .map(split_fields)
            .unwrap_or_default(),
        sort,
        columns,
        rule_text,
        enricher,
    })
}

// ── Hierarchy ──────────────────────────────────────────────────────

impl From<HierarchyPayload> for HierarchyResponse {
    fn from(p: HierarchyPayload) -> Self {
        Self {
            total_count: p.total_record_count,
            base_url: p.base_url,
            root_nodes: p.super_parent_list.into_iter().map(RawNode::new).collect(),
            children_by_parent_id: p
                .parent_map
                .into_iter()
                .map(|(parent, kids)| (parent, kids.into_iter().map(RawNode::new).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::FaultKind;

    fn record() -> TemplateRecord {
        serde_json::from_value(json!({
            "masterLabel": "Account Hierarchy",
            "headerIconName": "standard:account",
            "recordIconName": "standard:account",
            "columnStructure": "[{\"type\":\"url\",\"fieldName\":\"recordUrl\",\"label\":\"Name\",\"typeAttributes\":{\"label\":{\"fieldName\":\"Name\"}}},{\"type\":\"text\",\"fieldName\":\"Industry\",\"label\":\"Industry\"}]",
            "objectApiName": "Account",
            "fieldsToQuery": "Id, Name ,Industry,,ParentId",
            "rootFieldApiName": "Ultimate_Parent__c",
            "parentFieldApiName": "ParentId",
            "defaultSortByField": "Name",
            "defaultSortDirection": "Asc",
            "recordStructure": "@strategy record-link"
        }))
        .expect("fixture should parse")
    }

    #[test]
    fn parses_full_template() {
        let config = parse_template("Account_Tree", record(), &EnricherRegistry::default())
            .unwrap();

        assert_eq!(config.template_label, "Account Hierarchy");
        assert_eq!(config.fields_to_query, vec!["Id", "Name", "Industry", "ParentId"]);
        assert_eq!(config.columns.len(), 2);
        assert_eq!(config.columns[0].display_field(), "Name");
        assert_eq!(
            config.sort,
            Some(SortSpec {
                field: "Name".into(),
                direction: SortDirection::Ascending,
            })
        );
        assert!(config.enricher.is_some());
        assert_eq!(config.rule_text.as_deref(), Some("@strategy record-link"));
    }

    #[test]
    fn sort_direction_fallbacks() {
        assert_eq!(parse_direction("t", Some("DESC")), SortDirection::Descending);
        assert_eq!(parse_direction("t", Some("descending")), SortDirection::Descending);
        assert_eq!(parse_direction("t", Some("sideways")), SortDirection::Ascending);
        assert_eq!(parse_direction("t", Some("  ")), SortDirection::Ascending);
        assert_eq!(parse_direction("t", None), SortDirection::Ascending);
    }

    #[test]
    fn absent_sort_field_means_no_sorting() {
        let mut rec = record();
        rec.default_sort_by_field = Some("  ".into());
        let config = parse_template("t", rec, &EnricherRegistry::default())
            .unwrap();
        assert_eq!(config.sort, None);
    }

    #[test]
    fn bad_rule_fails_the_load() {
        let mut rec = record();
        rec.record_structure = Some("x = nope(".into());
        let err = parse_template("t", rec, &EnricherRegistry::default())
            .expect_err("rule should not compile");
        assert_eq!(err.kind(), FaultKind::ConfigLoadFailed);
        assert!(err.to_string().contains("Invalid enrichment rule"));
    }

    #[test]
    fn bad_columns_fail_the_load() {
        let mut rec = record();
        rec.column_structure = Some("{not json".into());
        assert!(matches!(
            parse_template("t", rec, &EnricherRegistry::default()),
            Err(CoreError::ConfigLoadFailed { .. })
        ));
    }

    #[test]
    fn payload_converts_in_order() {
        let payload: HierarchyPayload = serde_json::from_value(json!({
            "totalRecordCount": 3,
            "baseUrl": "https://acme.example.com",
            "superParentList": [{"Id": "A", "Name": "Beta"}],
            "parentMap": {"A": [{"Id": "B"}, {"Id": "C"}]}
        }))
        .unwrap();

        let response = HierarchyResponse::from(payload);
        assert_eq!(response.total_count, 3);
        assert_eq!(response.root_nodes.len(), 1);
        let kids = response
            .children_of(&"A".into())
            .expect("A has children")
            .iter()
            .map(|n| n.get("Id").cloned().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(kids, vec![json!("B"), json!("C")]);
    }
}
