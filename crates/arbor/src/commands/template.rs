//! `arbor template show`: load one template and print its parsed layout.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use arbor_core::{
    ColumnSpec, EnricherRegistry, HierarchyConfig, HierarchySource, LoadOutcome, MetadataLoader,
    SortSpec,
};

use crate::cli::{GlobalOpts, TemplateArgs, TemplateCommand};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::{as_sink, diagnostics};

/// Serializable view of a parsed template.
#[derive(Debug, Serialize)]
struct TemplateView<'a> {
    name: &'a str,
    label: &'a str,
    header_icon: Option<&'a str>,
    record_icon: Option<&'a str>,
    object: Option<&'a str>,
    root_field: Option<&'a str>,
    parent_field: Option<&'a str>,
    fields_to_query: &'a [String],
    sort: Option<&'a SortSpec>,
    columns: &'a [ColumnSpec],
    rule: Option<&'a str>,
}

impl<'a> From<&'a HierarchyConfig> for TemplateView<'a> {
    fn from(c: &'a HierarchyConfig) -> Self {
        Self {
            name: &c.template_name,
            label: &c.template_label,
            header_icon: c.header_icon.as_deref(),
            record_icon: c.record_icon.as_deref(),
            object: c.object_name.as_deref(),
            root_field: c.root_field_name.as_deref(),
            parent_field: c.parent_field_name.as_deref(),
            fields_to_query: &c.fields_to_query,
            sort: c.sort.as_ref(),
            columns: &c.columns,
            rule: c.rule_text.as_deref(),
        }
    }
}

#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Type")]
    column_type: String,
    #[tabled(rename = "Width")]
    width: String,
}

impl From<&ColumnSpec> for ColumnRow {
    fn from(c: &ColumnSpec) -> Self {
        Self {
            field: c.display_field().to_owned(),
            label: c.heading().to_owned(),
            column_type: c.column_type.clone().unwrap_or_default(),
            width: c.initial_width.map(|w| w.to_string()).unwrap_or_default(),
        }
    }
}

fn detail(view: &TemplateView<'_>) -> String {
    let mut out = String::new();
    let opt = |v: Option<&str>| v.unwrap_or("-").to_owned();
    let _ = writeln!(out, "Template:    {} ({})", view.label, view.name);
    let _ = writeln!(out, "Object:      {}", opt(view.object));
    let _ = writeln!(out, "Root field:  {}", opt(view.root_field));
    let _ = writeln!(out, "Parent field: {}", opt(view.parent_field));
    let _ = writeln!(out, "Fields:      {}", view.fields_to_query.join(", "));
    let _ = writeln!(
        out,
        "Sort:        {}",
        view.sort
            .map_or_else(|| "-".to_owned(), |s| format!("{} {}", s.field, s.direction))
    );
    let _ = writeln!(out, "Icons:       {} / {}", opt(view.header_icon), opt(view.record_icon));
    if let Some(rule) = view.rule {
        let _ = writeln!(out, "Rule:");
        for line in rule.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    if !view.columns.is_empty() {
        let rows: Vec<ColumnRow> = view.columns.iter().map(ColumnRow::from).collect();
        let _ = writeln!(out);
        out.push_str(&output::render_table(&rows));
    }
    out.truncate(out.trim_end().len());
    out
}

pub async fn handle<S: HierarchySource>(
    source: Arc<S>,
    args: TemplateArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        TemplateCommand::Show { name } => {
            let sink = diagnostics();
            let loader = MetadataLoader::new(source, EnricherRegistry::default(), as_sink(&sink));
            let config = match loader.load(Some(&name)).await? {
                LoadOutcome::Loaded(config) => config,
                LoadOutcome::Skipped | LoadOutcome::Unchanged | LoadOutcome::Superseded => {
                    return Err(CliError::NoTemplate);
                }
            };

            let view = TemplateView::from(config.as_ref());
            let format = config::output_format(global, cfg);
            let rendered = output::render_value(format, &view, detail)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
