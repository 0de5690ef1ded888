//! Composable filtered reads over node records.
//!
//! # Responsibility
//! - Accumulate id, string, time, root and pagination filters.
//! - Execute list/count/delete and tree terminals.
//! - Eager-load requested side data in bulk for every matched record.
//!
//! # Invariants
//! - Queries are values: setters consume and return, `Clone` branches.
//! - List order is `created_at ASC, id ASC`.
//! - Count, exists and delete ignore pagination.

mod filter;
mod hydrate;
mod node_query;
mod typed_query;

pub use filter::{StringFilter, TimeFilter};
pub use node_query::NodeQuery;
pub use typed_query::TypedQuery;
