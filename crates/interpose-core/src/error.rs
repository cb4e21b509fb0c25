//! Core error types for interpose-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! every way a type definition can be rejected by the registry.

use crate::type_id::TypeId;
use thiserror::Error;

/// Core errors produced by the interpose-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a type name that already exists in the registry.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A TypeId was not found in the type registry.
    #[error("type not found: TypeId({id})", id = id.0)]
    TypeNotFound { id: TypeId },

    /// Two operations with the same name on one type (accessors included).
    #[error("duplicate operation '{operation}' on type '{type_name}'")]
    DuplicateOperation { type_name: String, operation: String },

    /// A class names a base that is not an extendable class.
    #[error("type '{type_name}' cannot extend '{base}': {reason}")]
    InvalidBase {
        type_name: String,
        base: String,
        reason: String,
    },

    /// A type lists something other than an interface as implemented.
    #[error("type '{type_name}' cannot implement '{interface}': not an interface")]
    NotAnInterface { type_name: String, interface: String },

    /// A non-abstract class declares an operation without a body.
    #[error("operation '{operation}' on non-abstract class '{type_name}' must have a body")]
    AbstractOperationOnConcreteClass { type_name: String, operation: String },
}
