//! Error types for proxy synthesis, activation and calls.
//!
//! [`ProxyError`] covers everything detected eagerly: configuration,
//! unsupported shapes, and activation. [`CallError`] covers everything that
//! surfaces while a proxied operation runs; errors raised by interceptors or
//! original implementations travel through it unmodified.

use std::fmt;
use std::sync::Arc;

use interpose_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A required input to proxy synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructionParameter {
    AbstractType,
    ConcreteType,
    InterceptorType,
    ModuleContext,
}

impl fmt::Display for ConstructionParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstructionParameter::AbstractType => "abstract type",
            ConstructionParameter::ConcreteType => "concrete type",
            ConstructionParameter::InterceptorType => "interceptor type",
            ConstructionParameter::ModuleContext => "module context",
        };
        f.write_str(name)
    }
}

/// Errors detected at definition, synthesis or activation time.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("missing construction parameter: {parameter}")]
    MissingConstructionParameter { parameter: ConstructionParameter },

    #[error("invalid proxy configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("type '{type_name}' has no default constructor")]
    NoDefaultConstructor { type_name: String },

    #[error("not implemented: generic operation '{operation}' on '{type_name}'")]
    GenericOperation {
        type_name: String,
        operation: String,
    },

    #[error("not implemented: value type '{type_name}' cannot be proxied")]
    StructContract { type_name: String },

    #[error("type '{type_name}' is not an interceptor")]
    NotAnInterceptor { type_name: String },

    #[error("operation '{operation}' of '{type_name}' has no body")]
    MissingOperationBody {
        type_name: String,
        operation: String,
    },

    #[error("'{type_name}' declares no operation '{operation}' to attach a body to")]
    UnknownOperationBody {
        type_name: String,
        operation: String,
    },

    #[error("'{type_name}' declares a constructor taking {arity} argument(s) without a body")]
    MissingConstructorBody { type_name: String, arity: usize },

    #[error("'{type_name}' is not a class and cannot carry behaviour")]
    NotAClass { type_name: String },

    #[error("no constructor available for '{type_name}' taking {} argument(s)", arguments.len())]
    NoConstructorFound {
        type_name: String,
        arguments: Vec<Value>,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors surfacing from a call to a proxied operation.
///
/// Cheap to clone, so one outcome of a deferred base invocation can be
/// observed by every caller that joins it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("'{operation}' returned {actual}, which cannot be coerced to {expected}")]
    Coercion {
        operation: String,
        expected: String,
        actual: String,
    },

    #[error("'{operation}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {index} of '{operation}' expects {expected}, got {actual}")]
    ArgumentType {
        operation: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("proxy type '{type_name}' has no operation '{operation}'")]
    UnknownOperation {
        type_name: String,
        operation: String,
    },

    #[error("instance state of '{class}' is not a {expected}")]
    StateMismatch { class: String, expected: String },

    /// Plain failure message raised by a collaborator.
    #[error("{0}")]
    Fault(String),

    /// Arbitrary error raised by a collaborator.
    #[error("{0}")]
    Raised(Arc<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    pub fn fault(message: impl Into<String>) -> Self {
        CallError::Fault(message.into())
    }

    pub fn raised<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CallError::Raised(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn missing_parameter_names_the_parameter() {
        let err = ProxyError::MissingConstructionParameter {
            parameter: ConstructionParameter::InterceptorType,
        };
        assert_eq!(err.to_string(), "missing construction parameter: interceptor type");
    }

    #[test]
    fn no_constructor_reports_argument_count() {
        let err = ProxyError::NoConstructorFound {
            type_name: "ProxyGreeter_1".into(),
            arguments: vec![Value::I32(1), Value::Null],
        };
        assert!(err.to_string().contains("taking 2 argument(s)"));
    }

    #[test]
    fn raised_errors_keep_their_message() {
        let err = CallError::raised(DiskError);
        assert_eq!(err.to_string(), "disk on fire");

        let cloned = err.clone();
        match (err, cloned) {
            (CallError::Raised(a), CallError::Raised(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected Raised"),
        }
    }

    #[test]
    fn core_errors_convert() {
        let err: ProxyError = CoreError::DuplicateTypeName { name: "A".into() }.into();
        assert!(matches!(err, ProxyError::Core(_)));
    }
}
