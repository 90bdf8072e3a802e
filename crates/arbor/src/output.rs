//! Output formatting: outline, JSON, YAML, plain.
//!
//! The outline draws the tree with box-drawing guides and shows each
//! row's configured columns; structured formats serialize via serde.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use arbor_core::{ColumnSpec, EnrichedNode, TreeSnapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Structured renderers ─────────────────────────────────────────────

/// Render a serializable value in a structured format.
///
/// `Tree` and `Plain` fall back to `fallback`, which builds the
/// human-oriented text for the command at hand.
pub fn render_value<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
    fallback: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string())),
        OutputFormat::Tree | OutputFormat::Plain => Ok(fallback(data)),
    }
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Hierarchy outline ────────────────────────────────────────────────

/// How much of a snapshot to draw.
#[derive(Debug, Clone, Copy)]
pub struct OutlineOptions<'a> {
    pub primary_key: &'a str,
    pub max_depth: Option<usize>,
    pub color: bool,
    /// Record to mark with the template's record icon.
    pub highlight: Option<&'a str>,
}

/// Draw the snapshot as an indented outline.
///
/// The first column is the row label; remaining non-empty columns follow
/// it, separated by " · ". Without columns the primary key is the label.
pub fn render_outline(snapshot: &TreeSnapshot, opts: &OutlineOptions<'_>) -> String {
    let mut out = String::new();
    let roots = snapshot.tree.roots();
    let record_icon = snapshot.record_icon.as_deref();

    // Pending rows as (node, prefix, last sibling, depth), popped in pre-order.
    let mut pending: Vec<(&EnrichedNode, String, bool, usize)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, root)| (root, String::new(), i + 1 == roots.len(), 0))
        .collect();

    while let Some((node, prefix, last, depth)) = pending.pop() {
        draw_row(&mut out, node, &snapshot.columns, record_icon, opts, &prefix, last, depth);

        if opts.max_depth.is_some_and(|max| depth >= max) {
            if node.has_children() {
                let hidden = node.subtree_len() - 1;
                let _ = writeln!(out, "{prefix}{}    … {hidden} more", guide(depth, last));
            }
            continue;
        }

        let child_prefix = format!("{prefix}{}", guide(depth, last));
        let children = node.children();
        for (i, child) in children.iter().enumerate().rev() {
            pending.push((child, child_prefix.clone(), i + 1 == children.len(), depth + 1));
        }
    }

    out.truncate(out.trim_end().len());
    out
}

#[allow(clippy::too_many_arguments)]
fn draw_row(
    out: &mut String,
    node: &EnrichedNode,
    columns: &[ColumnSpec],
    record_icon: Option<&str>,
    opts: &OutlineOptions<'_>,
    prefix: &str,
    last: bool,
    depth: usize,
) {
    let branch = if depth == 0 {
        ""
    } else if last {
        "└── "
    } else {
        "├── "
    };

    let (label, details) = row_text(node, columns, opts.primary_key);
    let id = node.id(opts.primary_key);
    let marker = match (opts.highlight, record_icon, &id) {
        (Some(target), Some(icon), Some(id)) if id.as_str() == target => format!(" [{icon}]"),
        _ => String::new(),
    };

    let _ = write!(out, "{prefix}{branch}");
    if opts.color {
        let _ = write!(out, "{}", label.bold());
        if !marker.is_empty() {
            let _ = write!(out, "{}", marker.cyan());
        }
        if !details.is_empty() {
            let _ = write!(out, "  {}", details.dimmed());
        }
    } else {
        let _ = write!(out, "{label}{marker}");
        if !details.is_empty() {
            let _ = write!(out, "  {details}");
        }
    }
    out.push('\n');
}

/// Continuation guide under a node, for its children.
fn guide(depth: usize, last: bool) -> &'static str {
    match (depth, last) {
        (0, _) => "",
        (_, true) => "    ",
        (_, false) => "│   ",
    }
}

fn row_text(node: &EnrichedNode, columns: &[ColumnSpec], primary_key: &str) -> (String, String) {
    let mut cells = columns.iter().map(|c| node.text(c.display_field()));
    let label = cells
        .next()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| node.text(primary_key));
    let details = cells.filter(|c| !c.is_empty()).collect::<Vec<_>>().join(" · ");
    (label, details)
}

/// One primary key per line, indented two spaces per level.
pub fn render_plain(snapshot: &TreeSnapshot, primary_key: &str, max_depth: Option<usize>) -> String {
    snapshot
        .tree
        .walk()
        .filter(|(depth, _)| max_depth.is_none_or(|max| *depth <= max))
        .map(|(depth, node)| format!("{}{}", "  ".repeat(depth), node.text(primary_key)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Footer line: shown/total counts and build time.
pub fn render_summary(snapshot: &TreeSnapshot) -> String {
    let built = snapshot
        .built_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");
    format!(
        "{} · {} of {} records · built {built}",
        snapshot.title, snapshot.node_count, snapshot.total_count
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arbor_core::{CollectingSink, HierarchyConfig, HierarchyResponse, build_tree};
    use serde_json::json;

    use super::*;

    fn config() -> HierarchyConfig {
        let columns: Vec<ColumnSpec> = serde_json::from_value(json!([
            {"fieldName": "Name", "label": "Name"},
            {"fieldName": "Industry", "label": "Industry"}
        ]))
        .unwrap();

        HierarchyConfig {
            template_name: "Tree".into(),
            template_label: "Account Tree".into(),
            header_icon: None,
            record_icon: Some("standard:account".into()),
            object_name: Some("Account".into()),
            root_field_name: None,
            parent_field_name: None,
            fields_to_query: vec![],
            sort: None,
            columns,
            rule_text: None,
            enricher: None,
        }
    }

    fn snapshot() -> TreeSnapshot {
        let response: HierarchyResponse = serde_json::from_value(json!({
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
        .unwrap();

        let config = config();
        let assembled = build_tree(&response, &config, "Id", &CollectingSink::new());
        TreeSnapshot::from_parts(1, &config, assembled)
    }

    #[test]
    fn outline_draws_guides_and_columns() {
        let text = render_outline(
            &snapshot(),
            &OutlineOptions {
                primary_key: "Id",
                max_depth: None,
                color: false,
                highlight: Some("2"),
            },
        );
        insta::assert_snapshot!(text, @r"
        Acme  Retail
        ├── Acme East [standard:account]  Retail
        │   └── Boston
        └── Acme West
        ");
    }

    #[test]
    fn outline_depth_limit_counts_hidden_rows() {
        let text = render_outline(
            &snapshot(),
            &OutlineOptions {
                primary_key: "Id",
                max_depth: Some(0),
                color: false,
                highlight: None,
            },
        );
        assert_eq!(text, "Acme  Retail\n    … 3 more");
    }

    #[test]
    fn outline_of_a_deep_chain_draws_every_level() {
        let mut parents = serde_json::Map::new();
        for i in 1..3_000 {
            parents.insert(
                (i - 1).to_string(),
                json!([{"Id": i.to_string(), "Name": i.to_string()}]),
            );
        }
        let response: HierarchyResponse = serde_json::from_value(json!({
            "total_count": 3_000,
            "base_url": "https://acme.example.com",
            "root_nodes": [{"Id": "0", "Name": "0"}],
            "children_by_parent_id": parents,
        }))
        .unwrap();
        let config = config();
        let assembled = build_tree(&response, &config, "Id", &CollectingSink::new());
        let snapshot = TreeSnapshot::from_parts(1, &config, assembled);

        let text = render_outline(
            &snapshot,
            &OutlineOptions {
                primary_key: "Id",
                max_depth: None,
                color: false,
                highlight: None,
            },
        );
        assert_eq!(text.lines().count(), 3_000);
        assert!(text.lines().next_back().is_some_and(|l| l.ends_with("└── 2999")));
    }

    #[test]
    fn plain_lists_ids_by_depth() {
        assert_eq!(render_plain(&snapshot(), "Id", None), "1\n  2\n    4\n  3");
        assert_eq!(render_plain(&snapshot(), "Id", Some(1)), "1\n  2\n  3");
    }
}
