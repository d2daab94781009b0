// Resource entry points and count selection

pub mod count;
pub mod traits;

// Re-export commonly used items
pub use count::{CountStrategy, decide, read_count};
pub use traits::{AggregationFilter, GridFilter};
