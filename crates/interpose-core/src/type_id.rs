//! TypeId and TypeRegistry for nominal typing.
//!
//! Every registered type has a unique [`TypeId`] providing O(1) identity
//! comparison. The [`TypeRegistry`] manages type registration and lookup,
//! validates inheritance edges as they are added, and answers the
//! hierarchy questions the proxy synthesizer asks: the base chain of a class,
//! assignability, and the flattened public instance contract of a type.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::contract::{OperationDef, PropertyDef, TypeDef, TypeKind};
use crate::error::CoreError;

/// Unique identifier for a type in the type registry.
///
/// The inner value is an index into the [`TypeRegistry`]'s type vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Registry of all types known to a program, providing nominal identity via
/// [`TypeId`].
///
/// Types can only refer to types registered before them, so the inheritance
/// graph is acyclic by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    /// Types indexed by TypeId.0
    types: Vec<TypeDef>,
    /// Name lookup
    names: HashMap<String, TypeId>,
    /// Next available ID
    next_id: u32,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        TypeRegistry {
            types: Vec::new(),
            names: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers a type under its own name, returning its [`TypeId`].
    ///
    /// Rejects duplicate type names, duplicate operation names, unknown or
    /// non-extendable bases, non-interface entries in `interfaces`, and
    /// abstract operations on non-abstract classes.
    pub fn register_named(&mut self, def: TypeDef) -> Result<TypeId, CoreError> {
        if self.names.contains_key(&def.name) {
            return Err(CoreError::DuplicateTypeName {
                name: def.name.clone(),
            });
        }
        self.validate(&def)?;

        let id = TypeId(self.next_id);
        self.names.insert(def.name.clone(), id);
        self.types.push(def);
        self.next_id += 1;
        Ok(id)
    }

    fn validate(&self, def: &TypeDef) -> Result<(), CoreError> {
        if let Some(base_id) = def.base {
            let base = self.require(base_id)?;
            let reason = match (def.kind, base.kind) {
                (TypeKind::Class { .. }, TypeKind::Class { sealed: true, .. }) => {
                    Some("base class is sealed")
                }
                (TypeKind::Class { .. }, TypeKind::Class { .. }) => None,
                (TypeKind::Class { .. }, _) => Some("base is not a class"),
                _ => Some("only classes have a base class"),
            };
            if let Some(reason) = reason {
                return Err(CoreError::InvalidBase {
                    type_name: def.name.clone(),
                    base: base.name.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        for &iface in &def.interfaces {
            let target = self.require(iface)?;
            if !target.is_interface() {
                return Err(CoreError::NotAnInterface {
                    type_name: def.name.clone(),
                    interface: target.name.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        let concrete_class = matches!(
            def.kind,
            TypeKind::Class {
                is_abstract: false,
                ..
            }
        );
        for op in def.declared_operations() {
            if !seen.insert(op.name.clone()) {
                return Err(CoreError::DuplicateOperation {
                    type_name: def.name.clone(),
                    operation: op.name,
                });
            }
            if concrete_class && op.is_abstract {
                return Err(CoreError::AbstractOperationOnConcreteClass {
                    type_name: def.name.clone(),
                    operation: op.name,
                });
            }
        }
        Ok(())
    }

    /// Looks up a type by its [`TypeId`].
    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0 as usize)
    }

    /// Like [`get`](Self::get), but a missing type is an error.
    pub fn require(&self, id: TypeId) -> Result<&TypeDef, CoreError> {
        self.get(id).ok_or(CoreError::TypeNotFound { id })
    }

    /// Looks up a type's [`TypeId`] by name.
    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Returns the type's name, or its id rendering if unknown.
    pub fn name_of(&self, id: TypeId) -> String {
        self.get(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type itself followed by its base classes, most derived first.
    pub fn base_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(ty) = current {
            let Some(def) = self.get(ty) else { break };
            chain.push(ty);
            current = def.base;
        }
        chain
    }

    /// All interfaces reachable from the type's base chain, breadth first in
    /// declaration order, without duplicates. Does not include `id` itself.
    pub fn all_interfaces(&self, id: TypeId) -> Vec<TypeId> {
        let mut queue: VecDeque<TypeId> = self
            .base_chain(id)
            .into_iter()
            .filter_map(|ty| self.get(ty))
            .flat_map(|def| def.interfaces.iter().copied())
            .collect();
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        while let Some(iface) = queue.pop_front() {
            if !seen.insert(iface) {
                continue;
            }
            result.push(iface);
            if let Some(def) = self.get(iface) {
                queue.extend(def.interfaces.iter().copied());
            }
        }
        result
    }

    /// Returns `true` if a value of type `from` can be used where `to` is
    /// expected: same type, a base class, or an implemented interface.
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        self.base_chain(from).contains(&to) || self.all_interfaces(from).contains(&to)
    }

    /// The flattened public instance contract of a type.
    ///
    /// Operations declared closer to `id` hide same-named operations further
    /// up the base chain; interface operations not declared by any class in
    /// the chain are appended as abstract. Order is most-derived first, then
    /// declaration order.
    pub fn instance_operations(&self, id: TypeId) -> Result<Vec<OperationDef>, CoreError> {
        self.require(id)?;
        let mut ops: IndexMap<String, OperationDef> = IndexMap::new();
        for ty in self.base_chain(id) {
            for op in self.require(ty)?.declared_operations() {
                if op.is_public_instance() {
                    ops.entry(op.name.clone()).or_insert(op);
                }
            }
        }
        for iface in self.all_interfaces(id) {
            for op in self.require(iface)?.declared_operations() {
                if op.is_public_instance() {
                    ops.entry(op.name.clone()).or_insert(op);
                }
            }
        }
        Ok(ops.into_values().collect())
    }

    /// Properties visible on a type, most-derived first.
    pub fn instance_properties(&self, id: TypeId) -> Result<Vec<PropertyDef>, CoreError> {
        self.require(id)?;
        let mut props: IndexMap<String, PropertyDef> = IndexMap::new();
        let sources = self
            .base_chain(id)
            .into_iter()
            .chain(self.all_interfaces(id));
        for ty in sources {
            for prop in &self.require(ty)?.properties {
                props.entry(prop.name.clone()).or_insert_with(|| prop.clone());
            }
        }
        Ok(props.into_values().collect())
    }

    /// Finds the class in `id`'s base chain that declares `operation`,
    /// returning the declaring type and its declaration.
    ///
    /// Interface declarations are not considered; an abstract declaration is
    /// returned as found, so callers can tell "declared without body" from
    /// "not declared".
    pub fn resolve_operation(&self, id: TypeId, operation: &str) -> Option<(TypeId, OperationDef)> {
        self.base_chain(id).into_iter().find_map(|ty| {
            let def = self.get(ty)?;
            if def.is_interface() {
                return None;
            }
            def.declared_operations()
                .into_iter()
                .find(|op| op.name == operation)
                .map(|op| (ty, op))
        })
    }
}
