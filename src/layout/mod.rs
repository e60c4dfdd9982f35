pub mod grid;
pub mod layout_cache;

pub use grid::{compute_layout, total_height, GridLayout, UNIT_HEIGHT};
pub use layout_cache::{CachedLayoutComputer, LayoutCache};
