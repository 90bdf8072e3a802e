// Enrich -> assemble -> sort for one response.

use crate::assemble::{AssembledTree, TreeAssembler};
use crate::diagnostics::DiagnosticSink;
use crate::model::{HierarchyConfig, HierarchyResponse};
use crate::sort::sort_tree;

/// Build the display tree for `response` under `config`.
///
/// The response is cloned; the caller's copy is never modified.
pub fn build_tree(
    response: &HierarchyResponse,
    config: &HierarchyConfig,
    primary_key: &str,
    sink: &dyn DiagnosticSink,
) -> AssembledTree {
    let mut assembled = TreeAssembler::new(primary_key, sink)
        .with_enricher(config.enricher.as_deref())
        .assemble(response.clone());
    if let Some(spec) = &config.sort {
        sort_tree(&mut assembled.tree, spec, primary_key, sink);
    }
    assembled
}
