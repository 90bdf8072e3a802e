// ── Domain model ──
//
// Canonical types for templates, records, and assembled trees. Wire
// types from arbor-api are converted into these in `convert`.

pub mod node;
pub mod response;
pub mod snapshot;
pub mod template;

pub use node::{CHILDREN_FIELD, DEFAULT_PRIMARY_KEY, EnrichedNode, FieldMap, NodeId, RawNode, Tree, Walk};
pub use response::{HierarchyResponse, QueryParams};
pub use snapshot::TreeSnapshot;
pub use template::{ColumnSpec, HierarchyConfig, SortDirection, SortSpec};
