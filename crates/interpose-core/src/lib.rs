pub mod types;
pub mod type_id;
pub mod contract;
pub mod id;
pub mod error;

// Re-export commonly used types
pub use types::{ValueType, ScalarType, EnumDef, StructDef, Visibility};
pub use type_id::{TypeId, TypeRegistry};
pub use contract::{TypeDef, TypeKind, OperationDef, PropertyDef, ConstructorDef};
pub use id::{OperationSlot, HookId};
pub use error::CoreError;
