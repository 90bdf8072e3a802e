// arbor-core: hierarchy loading, enrichment, assembly, sorting, and
// refresh coordination between arbor-api and consumers (CLI/TUI).

pub mod assemble;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod enrich;
pub mod error;
pub mod fetcher;
pub mod header;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod refresh;
pub mod sort;
pub mod source;
pub mod widget;

// ── Primary re-exports ──────────────────────────────────────────────
pub use assemble::{AssembledTree, TreeAssembler};
pub use config::{SourceConfig, TlsVerification};
pub use diagnostics::{BroadcastSink, CollectingSink, DiagnosticSink, TracingSink};
pub use enrich::{EnrichContext, Enricher, EnricherRegistry, Program, RuleError, enrich_node};
pub use error::{CoreError, FaultKind, HierarchyFault};
pub use fetcher::HierarchyFetcher;
pub use header::{
    DEFAULT_TICK, HeaderProps, HeaderWidget, RefreshSignal, RefreshState, elapsed_label,
};
pub use metadata::{LoadOutcome, MetadataLoader};
pub use pipeline::build_tree;
pub use refresh::{PresentationSink, RefreshCoordinator, RefreshOutcome, WidgetPhase};
pub use sort::{ValueOrder, sort_tree};
pub use source::{HierarchySource, PlatformSource};
pub use widget::{HierarchyWidget, WidgetOptions};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CHILDREN_FIELD, ColumnSpec, DEFAULT_PRIMARY_KEY, EnrichedNode, FieldMap, HierarchyConfig,
    HierarchyResponse, NodeId, QueryParams, RawNode, SortDirection, SortSpec, Tree, TreeSnapshot,
};
