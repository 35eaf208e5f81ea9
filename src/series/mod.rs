pub mod datastructures;
pub mod packing;

pub use datastructures::{Category, Distance, Series, effective_meters, distances_compatible};
pub use packing::{PackingError, Placement, SeriesPlan, ValidationIssue};
