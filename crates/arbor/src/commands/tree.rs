//! `arbor tree`: load the template, fetch, and print the hierarchy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use arbor_core::{
    EnricherRegistry, HierarchySource, HierarchyWidget, PresentationSink, RefreshOutcome,
    TreeSnapshot,
};

use crate::cli::{GlobalOpts, OutputFormat, TreeArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, OutlineOptions};

use super::{as_sink, diagnostics, print_diagnostics};

// ── Presentation ────────────────────────────────────────────────────

/// Spinner on stderr while the widget is busy. Drawing happens after the
/// widget settles, so `render` has nothing to wait for.
pub struct SpinnerPresenter {
    enabled: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl SpinnerPresenter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            spinner: Mutex::new(None),
        }
    }
}

impl PresentationSink for SpinnerPresenter {
    fn set_busy(&self, busy: bool) {
        let mut slot = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(spinner) = slot.take() {
            spinner.finish_and_clear();
        }
        if busy && self.enabled {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner:.magenta} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message("Fetching hierarchy…");
            spinner.enable_steady_tick(Duration::from_millis(80));
            *slot = Some(spinner);
        }
    }

    async fn render(&self, _snapshot: Arc<TreeSnapshot>) {}

    fn expand_all(&self) {}
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<S: HierarchySource>(
    source: Arc<S>,
    args: &TreeArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let options = config::resolve_widget_options(global, cfg, args);
    if options
        .template_name
        .as_deref()
        .is_none_or(|t| t.trim().is_empty())
    {
        return Err(CliError::NoTemplate);
    }

    let format = config::output_format(global, cfg);
    let sink = diagnostics();
    let presenter = Arc::new(SpinnerPresenter::new(
        !global.quiet && format == OutputFormat::Tree,
    ));
    let widget = HierarchyWidget::new(
        source,
        presenter,
        as_sink(&sink),
        EnricherRegistry::default(),
        options,
    );

    let outcome = widget.start().await?;
    let snapshot = match outcome {
        RefreshOutcome::Rendered(snapshot) => snapshot,
        RefreshOutcome::Failed(err) => return Err(err.into()),
        RefreshOutcome::Skipped | RefreshOutcome::Stale { .. } => {
            return Err(CliError::NoTemplate);
        }
    };
    print_diagnostics(&sink, global.quiet);

    let primary_key = widget.options().primary_key_field.as_str();
    let rendered = match format {
        OutputFormat::Tree => {
            let mut text = output::render_outline(
                &snapshot,
                &OutlineOptions {
                    primary_key,
                    max_depth: args.depth,
                    color: output::should_color(global.color),
                    highlight: widget.options().record_id.as_deref(),
                },
            );
            if !args.no_summary {
                text.push_str("\n\n");
                text.push_str(&output::render_summary(&snapshot));
            }
            text
        }
        OutputFormat::Plain => output::render_plain(&snapshot, primary_key, args.depth),
        structured => output::render_value(structured, snapshot.as_ref(), |_| String::new())?,
    };

    output::print_output(&rendered, global.quiet);
    Ok(())
}
