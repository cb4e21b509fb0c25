//! Stable ID newtypes for proxy entities.
//!
//! All IDs are distinct newtype wrappers, providing type safety so that an
//! `OperationSlot` cannot be accidentally used where a `HookId` is expected.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Position of an operation in a synthesized proxy type's operation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationSlot(pub u32);

/// Identity of a registered hook instance.
///
/// Two `HookId`s are equal exactly when they were taken from clones of the
/// same `Arc` allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId(pub usize);

impl HookId {
    /// Identity of the allocation behind `hook`.
    pub fn of<T: ?Sized>(hook: &Arc<T>) -> Self {
        HookId(Arc::as_ptr(hook).cast::<()>() as usize)
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for OperationSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
