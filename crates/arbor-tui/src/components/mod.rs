pub mod header;
pub mod tree_grid;

pub use header::HeaderBar;
pub use tree_grid::TreeGrid;
