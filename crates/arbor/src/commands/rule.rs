//! `arbor rule`: compile enrichment rules and try them on a record.

use std::path::Path;

use serde::Serialize;

use arbor_core::enrich::STRATEGY_PREFIX;
use arbor_core::{EnrichContext, Enricher, EnricherRegistry, FieldMap, Program, RawNode};

use crate::cli::{GlobalOpts, OutputFormat, RuleArgs, RuleCommand};
use crate::error::CliError;
use crate::output;

/// What `rule check` found.
#[derive(Debug, Serialize)]
struct CheckReport {
    kind: &'static str,
    /// Program outputs in assignment order, or the strategy key.
    outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<FieldMap>,
}

/// Rule text from the argument, or from a file when prefixed with `@`.
fn read_rule(arg: &str) -> Result<String, CliError> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(arg.to_owned()),
    }
}

fn read_record(path: &Path) -> Result<RawNode, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let fields: FieldMap = serde_json::from_str(&contents)?;
    Ok(RawNode::new(fields))
}

fn describe(text: &str) -> Result<(&'static str, Vec<String>), CliError> {
    let trimmed = text.trim();
    if let Some(key) = trimmed.strip_prefix(STRATEGY_PREFIX) {
        return Ok(("strategy", vec![key.trim().to_owned()]));
    }
    let program = Program::compile(trimmed)?;
    Ok(("program", program.outputs().map(str::to_owned).collect()))
}

fn summary(report: &CheckReport) -> String {
    let mut out = format!("✓ valid {} ({})", report.kind, report.outputs.join(", "));
    if let Some(ref record) = report.record {
        for (key, value) in record {
            let shown = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("\n  {key} = {shown}"));
        }
    }
    out
}

fn check(
    rule: &str,
    record: Option<&Path>,
    base_url: &str,
    primary_key: &str,
) -> Result<CheckReport, CliError> {
    let text = read_rule(rule)?;
    let registry = EnricherRegistry::default();
    let Some(enricher) = registry.compile(&text)? else {
        return Err(CliError::Validation {
            field: "rule".into(),
            reason: "rule text is empty".into(),
        });
    };
    let (kind, outputs) = describe(&text)?;

    let record = match record {
        Some(path) => {
            let node = read_record(path)?;
            let ctx = EnrichContext {
                base_url,
                primary_key_field: primary_key,
            };
            let derived = enricher.enrich(&node, &ctx)?;
            let mut merged = node.into_fields();
            merged.extend(derived);
            Some(merged)
        }
        None => None,
    };

    Ok(CheckReport {
        kind,
        outputs,
        record,
    })
}

#[allow(clippy::needless_pass_by_value)]
pub fn handle(args: RuleArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.output.unwrap_or(OutputFormat::Tree);
    let rendered = match args.command {
        RuleCommand::Check {
            rule,
            record,
            base_url,
            primary_key,
        } => {
            let report = check(&rule, record.as_deref(), &base_url, &primary_key)?;
            output::render_value(format, &report, summary)?
        }
        RuleCommand::Strategies => {
            let registry = EnricherRegistry::default();
            let keys: Vec<&str> = registry.keys().collect();
            output::render_value(format, &keys, |k| k.join("\n"))?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn program_outputs_are_listed() {
        let report = check("link = url(baseUrl, Id); label = upper(Name)", None, "", "Id")
            .unwrap();
        assert_eq!(report.kind, "program");
        assert_eq!(report.outputs, vec!["link", "label"]);
        assert!(report.record.is_none());
    }

    #[test]
    fn strategy_rules_are_recognized() {
        let report =
            check("@strategy record-link", None, "", "Id").unwrap();
        assert_eq!(report.kind, "strategy");
        assert_eq!(report.outputs, vec!["record-link"]);
    }

    #[test]
    fn evaluates_against_a_record_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Id": "001", "Name": "acme"}}"#).unwrap();

        let report = check(
            "recordUrl = url(baseUrl, Id)\nName = upper(Name)",
            Some(file.path()),
            "https://acme.example.com/",
            "Id",
        )
        .unwrap();

        let record = report.record.unwrap_or_default();
        assert_eq!(record["Name"], "ACME");
        assert_eq!(record["recordUrl"], "https://acme.example.com/001");
    }

    #[test]
    fn syntax_errors_surface_as_rule_errors() {
        let err = check("x = upper(", None, "", "Id").err();
        assert!(matches!(err, Some(CliError::Rule { .. })));
    }

    #[test]
    fn blank_rule_is_rejected() {
        let err = check("   ", None, "", "Id").err();
        assert!(matches!(err, Some(CliError::Validation { .. })));
    }
}
