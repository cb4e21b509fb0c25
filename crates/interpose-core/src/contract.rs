//! Type definitions: interfaces, classes and value records.
//!
//! [`TypeDef`] is the full descriptor of a type that can appear as the
//! abstract or concrete side of a proxy. Behaviour (operation bodies and
//! constructors) is not part of the descriptor; it is attached by the engine.
//!
//! Properties are sugar for accessor operations: a readable property `Name`
//! contributes `get_Name() -> T`, a writable one `set_Name(value: T)`.

use serde::{Deserialize, Serialize};

use crate::type_id::TypeId;
use crate::types::{ValueType, Visibility};

/// Structural kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Pure contract; every operation is abstract.
    Interface,
    /// Class. `sealed` classes cannot be extended; `is_abstract` classes may
    /// leave operations without a body.
    Class { sealed: bool, is_abstract: bool },
    /// Value record. Never proxyable.
    Struct,
}

/// A named, typed operation (method) of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDef {
    /// Operation name, unique within the declaring type.
    pub name: String,
    /// Named, typed parameters in declaration order.
    pub params: Vec<(String, ValueType)>,
    /// Return type (use `ValueType::Unit` for operations returning nothing).
    pub return_type: ValueType,
    /// `true` if the declaring type provides no body.
    pub is_abstract: bool,
    /// Static operations are never part of an instance contract.
    pub is_static: bool,
    pub visibility: Visibility,
    /// Open type parameters. Non-empty means the operation is generic.
    pub type_params: Vec<String>,
}

impl OperationDef {
    /// Creates a public, non-generic instance operation with a body.
    pub fn new(name: &str, params: Vec<(String, ValueType)>, return_type: ValueType) -> Self {
        OperationDef {
            name: name.to_string(),
            params,
            return_type,
            is_abstract: false,
            is_static: false,
            visibility: Visibility::Public,
            type_params: Vec::new(),
        }
    }

    /// Marks the operation as having no body in the declaring type.
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Declares open type parameters.
    pub fn generic(mut self, type_params: &[&str]) -> Self {
        self.type_params = type_params.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Returns the number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the operation is type-parameterized, either by its
    /// own type parameters or by an open type in its signature.
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
            || self.return_type.is_generic()
            || self.params.iter().any(|(_, ty)| ty.is_generic())
    }

    /// Returns `true` if the operation belongs to the public instance contract.
    pub fn is_public_instance(&self) -> bool {
        !self.is_static && self.visibility == Visibility::Public
    }

    pub fn returns_value(&self) -> bool {
        self.return_type != ValueType::Unit
    }
}

/// A property exposed through accessor operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub ty: ValueType,
    pub readable: bool,
    pub writable: bool,
    /// `true` if the accessors have no body in the declaring type.
    pub is_abstract: bool,
}

impl PropertyDef {
    /// Read-write property with accessor bodies.
    pub fn new(name: &str, ty: ValueType) -> Self {
        PropertyDef {
            name: name.to_string(),
            ty,
            readable: true,
            writable: true,
            is_abstract: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn getter_name(&self) -> String {
        format!("get_{}", self.name)
    }

    pub fn setter_name(&self) -> String {
        format!("set_{}", self.name)
    }

    /// The accessor operations this property contributes, getter first.
    pub fn accessors(&self) -> Vec<OperationDef> {
        let mut ops = Vec::with_capacity(2);
        if self.readable {
            ops.push(OperationDef {
                is_abstract: self.is_abstract,
                ..OperationDef::new(&self.getter_name(), Vec::new(), self.ty.clone())
            });
        }
        if self.writable {
            ops.push(OperationDef {
                is_abstract: self.is_abstract,
                ..OperationDef::new(
                    &self.setter_name(),
                    vec![("value".to_string(), self.ty.clone())],
                    ValueType::Unit,
                )
            });
        }
        ops
    }
}

/// Constructor signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDef {
    pub params: Vec<(String, ValueType)>,
    pub visibility: Visibility,
}

impl ConstructorDef {
    pub fn new(params: Vec<(String, ValueType)>) -> Self {
        ConstructorDef {
            params,
            visibility: Visibility::Public,
        }
    }

    /// The no-argument constructor.
    pub fn default_ctor() -> Self {
        Self::new(Vec::new())
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Full type descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Type name, unique within a registry.
    pub name: String,
    pub kind: TypeKind,
    /// Base class (classes only).
    pub base: Option<TypeId>,
    /// Implemented (classes) or extended (interfaces) interfaces.
    pub interfaces: Vec<TypeId>,
    /// Operations declared directly on this type, in declaration order.
    pub operations: Vec<OperationDef>,
    /// Properties declared directly on this type.
    pub properties: Vec<PropertyDef>,
    /// Declared constructors. A class with none has an implicit default one.
    pub constructors: Vec<ConstructorDef>,
}

impl TypeDef {
    fn with_kind(name: &str, kind: TypeKind) -> Self {
        TypeDef {
            name: name.to_string(),
            kind,
            base: None,
            interfaces: Vec::new(),
            operations: Vec::new(),
            properties: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// An extendable, non-abstract class.
    pub fn class(name: &str) -> Self {
        Self::with_kind(
            name,
            TypeKind::Class {
                sealed: false,
                is_abstract: false,
            },
        )
    }

    pub fn abstract_class(name: &str) -> Self {
        Self::with_kind(
            name,
            TypeKind::Class {
                sealed: false,
                is_abstract: true,
            },
        )
    }

    pub fn sealed_class(name: &str) -> Self {
        Self::with_kind(
            name,
            TypeKind::Class {
                sealed: true,
                is_abstract: false,
            },
        )
    }

    /// A value record. Registered for completeness; proxies of it are rejected.
    pub fn record(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Struct)
    }

    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn operation(mut self, op: OperationDef) -> Self {
        self.operations.push(op);
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.constructors.push(ctor);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class { .. })
    }

    pub fn is_struct(&self) -> bool {
        self.kind == TypeKind::Struct
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.kind, TypeKind::Class { sealed: true, .. })
    }

    /// Interfaces and non-sealed classes can be extended by a proxy.
    pub fn is_extendable(&self) -> bool {
        match self.kind {
            TypeKind::Interface => true,
            TypeKind::Class { sealed, .. } => !sealed,
            TypeKind::Struct => false,
        }
    }

    /// Declared operations followed by property accessors. Interface
    /// operations are always abstract.
    pub fn declared_operations(&self) -> Vec<OperationDef> {
        let interface = self.is_interface();
        self.operations
            .iter()
            .cloned()
            .chain(self.properties.iter().flat_map(PropertyDef::accessors))
            .map(|mut op| {
                if interface {
                    op.is_abstract = true;
                }
                op
            })
            .collect()
    }

    /// `true` if the type can be built with no arguments.
    pub fn has_default_constructor(&self) -> bool {
        self.constructors.is_empty() || self.constructors.iter().any(|c| c.arity() == 0)
    }
}
