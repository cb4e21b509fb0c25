//! Runtime value representation for proxied calls.
//!
//! [`Value`] is the dynamic runtime counterpart to interpose-core's static
//! [`ValueType`](interpose_core::ValueType). Arguments are captured as
//! `Value`s, interceptors return a `Value`, and the trampoline coerces it back
//! to the operation's declared return type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use interpose_core::type_id::TypeId;

use crate::error::CallError;

/// Shared, type-erased instance state.
pub type ObjectState = Arc<dyn Any + Send + Sync>;

/// A runtime value passed into or returned from a proxied operation.
///
/// Maps to the interpose type system:
/// - Scalars: `Bool`, `I8`-`I64`, `U8`-`U64`, `Char`, `F32`, `F64`
/// - Compound: `Enum`, `Struct`
/// - References: `Str`, `Object`, and `Null` (the absent reference)
/// - `Unit` for operations that return nothing
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Char(char),
    F32(f32),
    F64(f64),
    Str(String),
    Enum {
        name: String,
        variant: u32,
    },
    /// Struct fields in declaration order.
    Struct {
        name: String,
        fields: Vec<Value>,
    },
    Object(ObjectRef),
    Null,
    Unit,
}

impl Value {
    /// Returns a human-readable description of the value's type.
    pub fn type_name(&self) -> String {
        match self {
            Value::Bool(_) => "Bool".into(),
            Value::I8(_) => "I8".into(),
            Value::I16(_) => "I16".into(),
            Value::I32(_) => "I32".into(),
            Value::I64(_) => "I64".into(),
            Value::U8(_) => "U8".into(),
            Value::U16(_) => "U16".into(),
            Value::U32(_) => "U32".into(),
            Value::U64(_) => "U64".into(),
            Value::Char(_) => "Char".into(),
            Value::F32(_) => "F32".into(),
            Value::F64(_) => "F64".into(),
            Value::Str(_) => "String".into(),
            Value::Enum { name, .. } => format!("enum {}", name),
            Value::Struct { name, .. } => format!("struct {}", name),
            Value::Object(obj) => format!("object {}", obj.class()),
            Value::Null => "null".into(),
            Value::Unit => "unit".into(),
        }
    }

    /// Widens any integer value to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v.into()),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

/// Reference to an instance of a registered class.
///
/// Carries the instance's runtime class (for checked downcasts during
/// coercion) and its type-erased state. Clones share the same state; equality
/// is reference identity.
#[derive(Clone)]
pub struct ObjectRef {
    class: TypeId,
    state: ObjectState,
}

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(class: TypeId, state: T) -> Self {
        ObjectRef {
            class,
            state: Arc::new(state),
        }
    }

    pub fn from_state(class: TypeId, state: ObjectState) -> Self {
        ObjectRef { class, state }
    }

    /// The runtime class of the instance.
    pub fn class(&self) -> TypeId {
        self.class
    }

    /// Borrows the instance state as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    /// Like [`downcast_ref`](Self::downcast_ref), for use inside operation
    /// bodies where a wrong state type is a call error.
    pub fn state<T: Any>(&self) -> Result<&T, CallError> {
        self.downcast_ref::<T>().ok_or_else(|| CallError::StateMismatch {
            class: self.class.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("class", &self.class)
            .field("state", &Arc::as_ptr(&self.state))
            .finish()
    }
}
