//! Type-erased mapper table keyed by (type, kind).

use super::{NodeMapper, NodeModel};
use crate::error::{NodError, NodResult};
use crate::model::node::{Node, NodeRecord};
use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

trait ErasedMapper: Send + Sync {
    fn model_type_id(&self) -> TypeId;
    fn model_type_name(&self) -> &'static str;
    /// Returns `None` when `model` is not the bound model type.
    fn to_node(&self, model: &dyn Any) -> Option<NodResult<Node>>;
    fn from_node(&self, node: &Node) -> NodResult<Box<dyn Any>>;
}

struct Erased<T, M> {
    mapper: M,
    _model: PhantomData<fn(&T) -> T>,
}

impl<T, M> ErasedMapper for Erased<T, M>
where
    T: 'static,
    M: NodeMapper<T>,
{
    fn model_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn model_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn to_node(&self, model: &dyn Any) -> Option<NodResult<Node>> {
        model
            .downcast_ref::<T>()
            .map(|model| self.mapper.to_node(model))
    }

    fn from_node(&self, node: &Node) -> NodResult<Box<dyn Any>> {
        let model = self.mapper.from_node(node)?;
        Ok(Box::new(model))
    }
}

/// Registry of mappers for heterogeneous domain types.
#[derive(Default)]
pub struct MapperRegistry {
    by_pair: BTreeMap<(String, String), Box<dyn ErasedMapper>>,
}

impl Debug for MapperRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.by_pair
                    .iter()
                    .map(|(pair, mapper)| (pair, mapper.model_type_name())),
            )
            .finish()
    }
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `mapper` with the (type, kind) pair.
    ///
    /// Registering a pair again replaces the previous mapper.
    pub fn register<T, M>(
        &mut self,
        node_type: impl Into<String>,
        node_kind: impl Into<String>,
        mapper: M,
    ) -> &mut Self
    where
        T: 'static,
        M: NodeMapper<T> + 'static,
    {
        self.by_pair.insert(
            (node_type.into(), node_kind.into()),
            Box::new(Erased {
                mapper,
                _model: PhantomData,
            }),
        );
        self
    }

    /// Builder form of [`MapperRegistry::register`].
    pub fn with<T, M>(
        mut self,
        node_type: impl Into<String>,
        node_kind: impl Into<String>,
        mapper: M,
    ) -> Self
    where
        T: 'static,
        M: NodeMapper<T> + 'static,
    {
        self.register(node_type, node_kind, mapper);
        self
    }

    pub fn contains(&self, node_type: &str, node_kind: &str) -> bool {
        self.by_pair
            .contains_key(&(node_type.to_string(), node_kind.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }

    /// Resolves the mapper for a model from its self-reported pair.
    pub fn for_model<T>(&self, model: &T) -> NodResult<Mapper<'_, T>>
    where
        T: NodeModel + 'static,
    {
        self.for_pair(model.node_type(), model.node_kind())
    }

    /// Resolves the mapper for a stored record from its (type, kind).
    pub fn for_node<T: 'static>(&self, record: &NodeRecord) -> NodResult<Mapper<'_, T>> {
        self.for_pair(&record.node_type, &record.kind)
    }

    pub fn for_pair<T: 'static>(&self, node_type: &str, node_kind: &str) -> NodResult<Mapper<'_, T>> {
        let erased = self
            .by_pair
            .get(&(node_type.to_string(), node_kind.to_string()))
            .ok_or_else(|| NodError::lookup(node_type, node_kind))?;

        if erased.model_type_id() != TypeId::of::<T>() {
            return Err(NodError::MapperTypeMismatch {
                node_type: node_type.to_string(),
                node_kind: node_kind.to_string(),
                expected: type_name::<T>(),
            });
        }

        Ok(Mapper {
            erased: erased.as_ref(),
            node_type: node_type.to_string(),
            node_kind: node_kind.to_string(),
            _model: PhantomData,
        })
    }

    /// Converts one stored aggregate through the mapper of its pair.
    pub fn materialize<T: 'static>(&self, node: &Node) -> NodResult<T> {
        self.for_node::<T>(&node.record)?.from_node(node)
    }
}

/// Mapper resolved from the registry and bound to `T`.
pub struct Mapper<'r, T> {
    erased: &'r dyn ErasedMapper,
    node_type: String,
    node_kind: String,
    _model: PhantomData<fn(&T) -> T>,
}

impl<T: 'static> Mapper<'_, T> {
    pub fn to_node(&self, model: &T) -> NodResult<Node> {
        let model: &dyn Any = model;
        self.erased
            .to_node(model)
            .unwrap_or_else(|| Err(self.mismatch()))
    }

    pub fn from_node(&self, node: &Node) -> NodResult<T> {
        self.erased
            .from_node(node)?
            .downcast::<T>()
            .map(|model| *model)
            .map_err(|_| self.mismatch())
    }

    fn mismatch(&self) -> NodError {
        NodError::MapperTypeMismatch {
            node_type: self.node_type.clone(),
            node_kind: self.node_kind.clone(),
            expected: type_name::<T>(),
        }
    }
}
