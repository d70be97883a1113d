//! The reverse direction: construct queries over named graphs, filtering,
//! and reconstruction of tabular results.

pub mod builder;
pub mod eval;
pub mod filter;
pub mod tabular;

pub use builder::{CarryoverUpdate, ConstructQuery, CountQuery};
pub use filter::{FilterCondition, FilterOp};
pub use tabular::{Reconstructor, TabularModel, TabularRow};
