//! Conversion between caller domain models and the generic node aggregate.
//!
//! # Responsibility
//! - Define the per-type mapper contract.
//! - Resolve mappers by the (type, kind) pair of a model or a stored record.
//!
//! # Invariants
//! - A record can only be materialized when its (type, kind) pair is
//!   registered for the requested Rust type.

use crate::error::NodResult;
use crate::model::node::Node;

mod registry;

pub use registry::{Mapper, MapperRegistry};

/// Domain model that reports which (type, kind) pair it is stored under.
pub trait NodeModel {
    fn node_type(&self) -> &str;
    fn node_kind(&self) -> &str;
}

/// Bidirectional converter between `T` and the node aggregate.
pub trait NodeMapper<T>: Send + Sync {
    fn to_node(&self, model: &T) -> NodResult<Node>;
    fn from_node(&self, node: &Node) -> NodResult<T>;
}
