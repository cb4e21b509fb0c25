//! Type catalog: descriptors plus the behaviour attached to them.
//!
//! The [`TypeRegistry`] in interpose-core only knows what types look like.
//! [`TypeCatalog`] pairs every class with its operation bodies and
//! constructors, and every interceptor type with the factory that builds its
//! instances. Proxies look behaviour up here at synthesis time; afterwards the
//! catalog is shared read-only behind an `Arc`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use interpose_core::contract::{ConstructorDef, TypeDef};
use interpose_core::type_id::{TypeId, TypeRegistry};
use interpose_core::types::ValueType;

use crate::coercion::{coerce, describe_type};
use crate::error::{CallError, ProxyError};
use crate::interceptor::Interceptor;
use crate::value::{ObjectRef, ObjectState, Value};

/// Original implementation of an instance operation.
pub type OperationBody =
    Arc<dyn Fn(&ObjectRef, &[Value]) -> Result<Value, CallError> + Send + Sync>;

/// Builds the state of a new instance from constructor arguments.
pub type ConstructorBody = Arc<dyn Fn(&[Value]) -> Result<ObjectState, CallError> + Send + Sync>;

/// Default constructor of an interceptor type.
pub type InterceptorFactory = Arc<dyn Fn() -> Box<dyn Interceptor> + Send + Sync>;

/// A type descriptor together with its operation bodies and constructors.
pub struct ClassBuilder {
    def: TypeDef,
    bodies: IndexMap<String, OperationBody>,
    constructors: Vec<(ConstructorDef, ConstructorBody)>,
}

impl ClassBuilder {
    pub fn new(def: TypeDef) -> Self {
        ClassBuilder {
            def,
            bodies: IndexMap::new(),
            constructors: Vec::new(),
        }
    }

    /// Attaches the body of a declared operation or property accessor.
    pub fn body<F>(mut self, operation: &str, body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.bodies.insert(operation.to_string(), Arc::new(body));
        self
    }

    /// Declares a constructor and the function building its instance state.
    ///
    /// Arguments reach `ctor` already coerced to `params`.
    pub fn constructor<T, F>(mut self, params: Vec<(String, ValueType)>, ctor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[Value]) -> Result<T, CallError> + Send + Sync + 'static,
    {
        let body: ConstructorBody =
            Arc::new(move |args: &[Value]| ctor(args).map(|state| Arc::new(state) as ObjectState));
        self.constructors.push((ConstructorDef::new(params), body));
        self
    }

    /// Shorthand for a no-argument constructor.
    pub fn default_state<T, F>(self, init: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor(Vec::new(), move |_| Ok(init()))
    }
}

#[derive(Default)]
struct ClassBehaviour {
    bodies: IndexMap<String, OperationBody>,
    constructors: Vec<(ConstructorDef, ConstructorBody)>,
}

/// Registry of types and their behaviour.
#[derive(Default)]
pub struct TypeCatalog {
    registry: TypeRegistry,
    classes: HashMap<TypeId, ClassBehaviour>,
    interceptors: HashMap<TypeId, InterceptorFactory>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type without behaviour: an interface, a record, or a class
    /// whose operations are all abstract.
    pub fn define(&mut self, def: TypeDef) -> Result<TypeId, ProxyError> {
        self.define_class(ClassBuilder::new(def))
    }

    /// Registers a type together with its behaviour.
    ///
    /// Every public, non-abstract instance operation a class declares must
    /// have a body, and every body must belong to a declared, non-abstract
    /// operation. Constructors come only from the builder.
    pub fn define_class(&mut self, builder: ClassBuilder) -> Result<TypeId, ProxyError> {
        let ClassBuilder {
            mut def,
            bodies,
            constructors,
        } = builder;

        if let Some(ctor) = def.constructors.first() {
            return Err(ProxyError::MissingConstructorBody {
                type_name: def.name.clone(),
                arity: ctor.arity(),
            });
        }
        if !def.is_class() && !constructors.is_empty() {
            return Err(ProxyError::NotAClass {
                type_name: def.name.clone(),
            });
        }

        let declared = def.declared_operations();
        for name in bodies.keys() {
            let known = declared
                .iter()
                .any(|op| op.name == *name && !op.is_abstract);
            if !known {
                return Err(ProxyError::UnknownOperationBody {
                    type_name: def.name.clone(),
                    operation: name.clone(),
                });
            }
        }
        if def.is_class() {
            let missing = declared.iter().find(|op| {
                !op.is_abstract && op.is_public_instance() && !bodies.contains_key(&op.name)
            });
            if let Some(op) = missing {
                return Err(ProxyError::MissingOperationBody {
                    type_name: def.name.clone(),
                    operation: op.name.clone(),
                });
            }
        }

        def.constructors = constructors.iter().map(|(sig, _)| sig.clone()).collect();
        let is_class = def.is_class();
        let id = self.registry.register_named(def)?;
        if is_class {
            self.classes.insert(id, ClassBehaviour { bodies, constructors });
        }
        Ok(id)
    }

    /// Registers an interceptor type built by `factory`.
    ///
    /// The factory plays the part of the interceptor's default constructor;
    /// every proxy instance gets its own interceptor from it.
    pub fn define_interceptor<I, F>(&mut self, name: &str, factory: F) -> Result<TypeId, ProxyError>
    where
        I: Interceptor + 'static,
        F: Fn() -> I + Send + Sync + 'static,
    {
        let id = self.registry.register_named(
            TypeDef::sealed_class(name).constructor(ConstructorDef::default_ctor()),
        )?;
        self.interceptors
            .insert(id, Arc::new(move || Box::new(factory()) as Box<dyn Interceptor>));
        Ok(id)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn type_def(&self, id: TypeId) -> Option<&TypeDef> {
        self.registry.get(id)
    }

    pub fn is_interceptor(&self, id: TypeId) -> bool {
        self.interceptors.contains_key(&id)
    }

    pub fn interceptor_factory(&self, id: TypeId) -> Option<&InterceptorFactory> {
        self.interceptors.get(&id)
    }

    /// The body `operation` runs with when called on an instance of `id`,
    /// found by walking the base chain. `None` if the nearest declaration is
    /// abstract or there is none.
    pub fn resolve_body(&self, id: TypeId, operation: &str) -> Option<OperationBody> {
        let (owner, op) = self.registry.resolve_operation(id, operation)?;
        if op.is_abstract {
            return None;
        }
        self.classes.get(&owner)?.bodies.get(operation).cloned()
    }

    pub fn has_default_constructor(&self, id: TypeId) -> bool {
        self.registry
            .get(id)
            .is_some_and(|def| def.is_class() && def.has_default_constructor())
    }

    /// Builds an instance of class `id` with its default constructor.
    pub fn instantiate_default(&self, id: TypeId) -> Result<ObjectRef, CallError> {
        self.construct(id, &[])
    }

    /// Builds an instance of class `id` with the first declared constructor
    /// whose parameters accept `args`.
    ///
    /// A class without declared constructors has an implicit default one
    /// producing empty state.
    pub fn construct(&self, id: TypeId, args: &[Value]) -> Result<ObjectRef, CallError> {
        let def = self
            .registry
            .get(id)
            .ok_or_else(|| CallError::fault(format!("unknown type {}", id)))?;
        let behaviour = match self.classes.get(&id) {
            Some(behaviour) if def.is_class() => behaviour,
            _ => {
                return Err(CallError::fault(format!(
                    "'{}' is not an instantiable class",
                    def.name
                )))
            }
        };

        if behaviour.constructors.is_empty() && args.is_empty() {
            return Ok(ObjectRef::new(id, ()));
        }

        let mut last_error = None;
        for (sig, body) in behaviour
            .constructors
            .iter()
            .filter(|(sig, _)| sig.arity() == args.len())
        {
            match self.coerce_arguments(&def.name, &sig.params, args) {
                Ok(coerced) => return body(&coerced).map(|state| ObjectRef::from_state(id, state)),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            CallError::fault(format!(
                "'{}' has no constructor taking {} argument(s)",
                def.name,
                args.len()
            ))
        }))
    }

    /// Coerces `args` to the declared parameter types of `operation`.
    pub(crate) fn coerce_arguments(
        &self,
        operation: &str,
        params: &[(String, ValueType)],
        args: &[Value],
    ) -> Result<Vec<Value>, CallError> {
        if params.len() != args.len() {
            return Err(CallError::ArgumentCount {
                operation: operation.to_string(),
                expected: params.len(),
                actual: args.len(),
            });
        }
        params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, ((_, ty), arg))| {
                coerce(arg.clone(), ty, &self.registry).map_err(|mismatch| {
                    CallError::ArgumentType {
                        operation: operation.to_string(),
                        index,
                        expected: describe_type(ty, &self.registry),
                        actual: mismatch.actual,
                    }
                })
            })
            .collect()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.registry.len())
            .field("classes", &self.classes.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
