//! The dynamic module every synthesized proxy type is defined in.

use indexmap::IndexSet;
use serde::Serialize;

/// Namespace of synthesized proxy type names.
///
/// One module exists per process. It is created by the first factory that
/// synthesizes a type and lives until the process exits.
#[derive(Debug, Clone, Serialize)]
pub struct DynamicModule {
    name: String,
    types: IndexSet<String>,
}

impl DynamicModule {
    pub fn new(name: &str) -> Self {
        DynamicModule {
            name: name.to_string(),
            types: IndexSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claims a type name, returning the name actually defined.
    ///
    /// A name already in the module gets the first free `_2`, `_3`, ...
    /// suffix, so defined names are unique.
    pub fn define_type(&mut self, requested: &str) -> String {
        let name = if self.types.contains(requested) {
            (2usize..)
                .map(|n| format!("{}_{}", requested, n))
                .find(|candidate| !self.types.contains(candidate))
                .unwrap_or_else(|| requested.to_string())
        } else {
            requested.to_string()
        };
        self.types.insert(name.clone());
        name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    /// Number of types defined so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Defined type names, in definition order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}
