//! Fixtures shared by the component tests.

use std::sync::Arc;

use ratatui::buffer::Buffer;
use serde_json::json;

use arbor_core::{
    CollectingSink, ColumnSpec, HierarchyConfig, HierarchyResponse, TreeSnapshot, build_tree,
};

/// Four records under one root, two columns, record icon set.
pub fn snapshot() -> Arc<TreeSnapshot> {
    snapshot_of(json!({
        "total_count": 4,
        "base_url": "https://acme.example.com",
        "root_nodes": [{"Id": "1", "Name": "Acme", "Industry": "Retail"}],
        "children_by_parent_id": {
            "1": [
                {"Id": "2", "Name": "Acme East", "Industry": "Retail"},
                {"Id": "3", "Name": "Acme West"}
            ],
            "2": [{"Id": "4", "Name": "Boston"}]
        }
    }))
}

/// A single chain `0 -> 1 -> ... -> depth - 1`.
pub fn chain(depth: usize) -> Arc<TreeSnapshot> {
    let mut parents = serde_json::Map::new();
    for i in 1..depth {
        parents.insert(
            (i - 1).to_string(),
            json!([{"Id": i.to_string(), "Name": format!("Level {i}")}]),
        );
    }
    snapshot_of(json!({
        "total_count": depth,
        "base_url": "https://acme.example.com",
        "root_nodes": [{"Id": "0", "Name": "Level 0"}],
        "children_by_parent_id": parents,
    }))
}

fn snapshot_of(response: serde_json::Value) -> Arc<TreeSnapshot> {
    let response: HierarchyResponse =
        serde_json::from_value(response).expect("fixture should deserialize");

    let columns: Vec<ColumnSpec> = serde_json::from_value(json!([
        {"fieldName": "Name", "label": "Name"},
        {"fieldName": "Industry", "label": "Industry"}
    ]))
    .expect("fixture should deserialize");

    let config = HierarchyConfig {
        template_name: "Account_Tree".into(),
        template_label: "Account Hierarchy".into(),
        header_icon: Some("standard:hierarchy".into()),
        record_icon: Some("standard:account".into()),
        object_name: Some("Account".into()),
        root_field_name: None,
        parent_field_name: None,
        fields_to_query: vec![],
        sort: None,
        columns,
        rule_text: None,
        enricher: None,
    };
    let assembled = build_tree(&response, &config, "Id", &CollectingSink::new());
    Arc::new(TreeSnapshot::from_parts(1, &config, assembled))
}

/// Rows of a rendered buffer as plain strings.
pub fn buffer_lines(buffer: &Buffer) -> Vec<String> {
    let width = usize::from(buffer.area.width);
    buffer
        .content()
        .chunks(width)
        .map(|row| row.iter().map(ratatui::buffer::Cell::symbol).collect())
        .collect()
}
