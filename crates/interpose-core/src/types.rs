//! The value type system seen by proxied operations.
//!
//! Provides every type an operation parameter or return value can have:
//! scalars (Bool, signed and unsigned integers, Char, F32, F64), strings,
//! enums, value records (structs), object references, the top type `Any`,
//! Unit (no value) and open generic parameters.
//!
//! Object references use nominal identity via [`TypeId`]. Enums and structs
//! carry their definition inline and use [`IndexMap`] for insertion-ordered
//! variants/fields.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::type_id::TypeId;

/// A parameter or return type of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    /// No value (`void`). Results of such operations are discarded.
    Unit,

    /// Scalar (primitive) value.
    Scalar(ScalarType),

    /// Owned string. A reference type: `Null` is a valid value.
    String,

    /// Named enum with explicit discriminants.
    Enum(EnumDef),

    /// Named value record with ordered fields.
    Struct(StructDef),

    /// Reference to an instance of a registered class or interface.
    Object(TypeId),

    /// Top reference type; accepts any value.
    Any,

    /// Open type parameter of a generic operation.
    Generic(String),
}

/// Scalar (primitive) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Char,
    F32,
    F64,
}

impl ScalarType {
    /// Returns `true` for the eight integer types.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::U8
                | ScalarType::U16
                | ScalarType::U32
                | ScalarType::U64
        )
    }

    /// Returns `true` for F32 and F64.
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }
}

/// Named enum definition with insertion-ordered variants.
///
/// Each variant maps to its discriminant. The zero value of an enum is the
/// discriminant `0`, whether or not a variant declares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub variants: IndexMap<String, u32>,
}

impl EnumDef {
    /// Creates an enum whose variants are numbered from zero in order.
    pub fn new(name: &str, variants: &[&str]) -> Self {
        EnumDef {
            name: name.to_string(),
            variants: variants
                .iter()
                .enumerate()
                .map(|(i, v)| (v.to_string(), i as u32))
                .collect(),
        }
    }

    /// Looks up a variant's discriminant.
    pub fn discriminant(&self, variant: &str) -> Option<u32> {
        self.variants.get(variant).copied()
    }
}

/// Named value record with insertion-ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub fields: IndexMap<String, ValueType>,
}

/// Visibility of an operation or constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl ValueType {
    pub const BOOL: ValueType = ValueType::Scalar(ScalarType::Bool);
    pub const I32: ValueType = ValueType::Scalar(ScalarType::I32);
    pub const I64: ValueType = ValueType::Scalar(ScalarType::I64);
    pub const F64: ValueType = ValueType::Scalar(ScalarType::F64);

    /// Returns `true` if `Null` is a valid value of this type.
    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Object(_) | ValueType::Any)
    }

    /// Returns `true` if this type mentions an open type parameter.
    pub fn is_generic(&self) -> bool {
        match self {
            ValueType::Generic(_) => true,
            ValueType::Struct(def) => def.fields.values().any(ValueType::is_generic),
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Unit => write!(f, "unit"),
            ValueType::Scalar(s) => write!(f, "{:?}", s),
            ValueType::String => write!(f, "String"),
            ValueType::Enum(def) => write!(f, "enum {}", def.name),
            ValueType::Struct(def) => write!(f, "struct {}", def.name),
            ValueType::Object(id) => write!(f, "object {}", id),
            ValueType::Any => write!(f, "Any"),
            ValueType::Generic(name) => write!(f, "{}", name),
        }
    }
}
