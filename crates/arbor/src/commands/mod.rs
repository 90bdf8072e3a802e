//! Command dispatch: bridges CLI args -> core widget/loader -> output formatting.

pub mod config_cmd;
pub mod rule;
pub mod template;
pub mod tree;

use std::sync::Arc;

use arbor_core::{CollectingSink, CoreError, DiagnosticSink, PlatformSource};

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

/// Dispatch a platform-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = config::active_profile_name(global, cfg);
    let source = config::resolve_source(global, cfg)?;
    let source = Arc::new(PlatformSource::new(&source)?);

    let result = match cmd {
        Command::Tree(args) => tree::handle(source, &args, cfg, global).await,
        Command::Template(args) => template::handle(source, args, cfg, global).await,
        // Local commands are handled before dispatch
        Command::Rule(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the platform dispatcher".into(),
        )),
    };
    result.map_err(|e| e.with_profile(&profile))
}

/// Diagnostics gathered during one command, echoed to stderr afterwards.
pub fn diagnostics() -> Arc<CollectingSink> {
    Arc::new(CollectingSink::new())
}

/// Print collected node-level diagnostics as warnings.
pub fn print_diagnostics(sink: &CollectingSink, quiet: bool) {
    if quiet {
        return;
    }
    for fault in sink.faults() {
        if is_warning(&fault) {
            eprintln!("warning: {fault}");
        }
    }
}

/// Node-local faults are warnings; request-level ones come back as errors.
fn is_warning(fault: &CoreError) -> bool {
    matches!(
        fault,
        CoreError::EnrichmentFailed { .. }
            | CoreError::SortFieldMissing { .. }
            | CoreError::MalformedHierarchy(_)
    )
}

pub(crate) fn as_sink(sink: &Arc<CollectingSink>) -> Arc<dyn DiagnosticSink> {
    Arc::clone(sink) as Arc<dyn DiagnosticSink>
}
