//! Proxy type synthesis.
//!
//! [`ProxySynthesizer::synthesize`] turns a (contract, implementation,
//! interceptor, hooks) request into a [`SynthesizedProxyType`]: it validates
//! the request, picks the proxy's shape from the concrete type, and builds
//! one [`Trampoline`] per public instance operation of the contract.
//!
//! Shapes:
//!
//! - **Interface**: the concrete type is an interface. No base state; every
//!   deferred base call resolves to the return type's zero value.
//! - **Inheritable class**: the proxy extends the concrete class. Base state
//!   comes from its default constructor and deferred calls run its bodies.
//! - **Sealed class**: the proxy extends the contract and wraps an instance of
//!   the sealed concrete class in its forwarding field. Deferred calls run on
//!   that instance.

pub mod module;
pub mod trampoline;

use std::sync::Arc;

use indexmap::IndexMap;
use interpose_core::contract::{ConstructorDef, OperationDef, PropertyDef, TypeDef};
use interpose_core::id::OperationSlot;
use interpose_core::type_id::TypeId;
use interpose_core::types::ValueType;
use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::coercion::{coerce, default_value};
use crate::error::{CallError, ConstructionParameter, ProxyError};
use crate::factory::FactoryConfig;
use crate::hooks::{HookSet, MethodBuilder};
use crate::instance::ProxyObject;
use crate::value::Value;

pub use module::DynamicModule;
pub use trampoline::{BaseKind, BaseTarget, Trampoline, TrampolineStep};

/// Name of the field holding the wrapped sealed instance.
pub const FORWARDING_FIELD: &str = "_decorator";
/// Name of the field holding the interceptor instance.
pub const INTERCEPTOR_FIELD: &str = "_proxyInvoker";

/// Structural strategy of a proxy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyShape {
    Interface,
    InheritableClass,
    SealedClass,
}

/// A field of a synthesized proxy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type of the field.
    pub ty: TypeId,
}

impl FieldDescriptor {
    pub fn new(name: &str, ty: TypeId) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            ty,
        }
    }
}

/// Constructors a proxy type offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyConstructor {
    /// Builds base state or the forwarding instance with the concrete type's
    /// default constructor.
    Default,
    /// Sealed shape only: wraps an existing instance of the concrete type.
    Decorator,
}

impl ProxyConstructor {
    pub fn arity(self) -> usize {
        match self {
            ProxyConstructor::Default => 0,
            ProxyConstructor::Decorator => 1,
        }
    }
}

/// One ask for a proxy type. Missing types are reported, not assumed.
#[derive(Clone, Default)]
pub struct SynthesisRequest {
    pub abstract_type: Option<TypeId>,
    pub concrete_type: Option<TypeId>,
    pub interceptor_type: Option<TypeId>,
    pub hooks: HookSet,
}

impl SynthesisRequest {
    /// The three types, or the first one missing.
    pub fn require_types(&self) -> Result<(TypeId, TypeId, TypeId), ProxyError> {
        let missing = |parameter| ProxyError::MissingConstructionParameter { parameter };
        let abstract_type = self
            .abstract_type
            .ok_or_else(|| missing(ConstructionParameter::AbstractType))?;
        let concrete_type = self
            .concrete_type
            .ok_or_else(|| missing(ConstructionParameter::ConcreteType))?;
        let interceptor_type = self
            .interceptor_type
            .ok_or_else(|| missing(ConstructionParameter::InterceptorType))?;
        Ok((abstract_type, concrete_type, interceptor_type))
    }
}

/// A generated proxy type.
pub struct SynthesizedProxyType {
    name: String,
    unique_id: i32,
    shape: ProxyShape,
    abstract_type: TypeId,
    concrete_type: TypeId,
    interceptor_type: TypeId,
    forwarding_field: Option<FieldDescriptor>,
    interceptor_field: FieldDescriptor,
    operations: IndexMap<String, Trampoline>,
    properties: Vec<PropertyDef>,
    constructors: Vec<ProxyConstructor>,
    catalog: Arc<TypeCatalog>,
}

impl SynthesizedProxyType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> i32 {
        self.unique_id
    }

    pub fn shape(&self) -> ProxyShape {
        self.shape
    }

    pub fn abstract_type(&self) -> TypeId {
        self.abstract_type
    }

    pub fn concrete_type(&self) -> TypeId {
        self.concrete_type
    }

    pub fn interceptor_type(&self) -> TypeId {
        self.interceptor_type
    }

    pub fn forwarding_field(&self) -> Option<&FieldDescriptor> {
        self.forwarding_field.as_ref()
    }

    pub fn interceptor_field(&self) -> &FieldDescriptor {
        &self.interceptor_field
    }

    /// Trampolines in operation-table order.
    pub fn operations(&self) -> impl Iterator<Item = &Trampoline> {
        self.operations.values()
    }

    pub fn operation(&self, name: &str) -> Option<&Trampoline> {
        self.operations.get(name)
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn constructors(&self) -> &[ProxyConstructor] {
        &self.constructors
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Signature of a constructor of this type.
    pub fn constructor_signature(&self, ctor: ProxyConstructor) -> ConstructorDef {
        match ctor {
            ProxyConstructor::Default => ConstructorDef::default_ctor(),
            ProxyConstructor::Decorator => ConstructorDef::new(vec![(
                "decorator".to_string(),
                ValueType::Object(self.concrete_type),
            )]),
        }
    }

    /// Serializable summary of the type.
    pub fn descriptor(&self) -> ProxyTypeDescriptor {
        let registry = self.catalog.registry();
        ProxyTypeDescriptor {
            name: self.name.clone(),
            unique_id: self.unique_id,
            shape: self.shape,
            abstract_type: registry.name_of(self.abstract_type),
            concrete_type: registry.name_of(self.concrete_type),
            interceptor_type: registry.name_of(self.interceptor_type),
            forwarding_field: self.forwarding_field.clone(),
            interceptor_field: self.interceptor_field.clone(),
            operations: self
                .operations()
                .map(|t| OperationDescriptor {
                    slot: t.slot(),
                    name: t.name().to_string(),
                    steps: t.steps(),
                })
                .collect(),
            properties: self.properties.iter().map(|p| p.name.clone()).collect(),
            constructors: self
                .constructors
                .iter()
                .map(|&c| self.constructor_signature(c))
                .collect(),
        }
    }

    /// Runs one constructor of this type.
    pub(crate) fn construct(
        self: &Arc<Self>,
        ctor: ProxyConstructor,
        args: &[Value],
    ) -> Result<ProxyObject, CallError> {
        if args.len() != ctor.arity() {
            return Err(CallError::ArgumentCount {
                operation: format!("{}::new", self.name),
                expected: ctor.arity(),
                actual: args.len(),
            });
        }

        let (base, forwarding) = match (self.shape, ctor) {
            (ProxyShape::Interface, _) => (None, None),
            (ProxyShape::InheritableClass, _) => {
                (Some(self.catalog.instantiate_default(self.concrete_type)?), None)
            }
            (ProxyShape::SealedClass, ProxyConstructor::Default) => {
                (None, Some(self.catalog.instantiate_default(self.concrete_type)?))
            }
            (ProxyShape::SealedClass, ProxyConstructor::Decorator) => {
                let target = ValueType::Object(self.concrete_type);
                let wrapped = coerce(args[0].clone(), &target, self.catalog.registry())
                    .ok()
                    .and_then(|value| value.as_object().cloned())
                    .ok_or_else(|| CallError::ArgumentType {
                        operation: format!("{}::new", self.name),
                        index: 0,
                        expected: self.catalog.registry().name_of(self.concrete_type),
                        actual: args[0].type_name(),
                    })?;
                (None, Some(wrapped))
            }
        };

        let factory = self
            .catalog
            .interceptor_factory(self.interceptor_type)
            .ok_or_else(|| CallError::fault(format!("'{}' lost its interceptor", self.name)))?;

        Ok(ProxyObject::new(Arc::clone(self), base, forwarding, factory()))
    }
}

impl std::fmt::Debug for SynthesizedProxyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedProxyType")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// Serializable view of a [`SynthesizedProxyType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyTypeDescriptor {
    pub name: String,
    pub unique_id: i32,
    pub shape: ProxyShape,
    pub abstract_type: String,
    pub concrete_type: String,
    pub interceptor_type: String,
    pub forwarding_field: Option<FieldDescriptor>,
    pub interceptor_field: FieldDescriptor,
    pub operations: Vec<OperationDescriptor>,
    pub properties: Vec<String>,
    pub constructors: Vec<ConstructorDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub slot: OperationSlot,
    pub name: String,
    pub steps: Vec<TrampolineStep>,
}

/// Builds proxy types out of a catalog.
pub struct ProxySynthesizer<'a> {
    catalog: &'a Arc<TypeCatalog>,
    config: &'a FactoryConfig,
}

impl<'a> ProxySynthesizer<'a> {
    pub fn new(catalog: &'a Arc<TypeCatalog>, config: &'a FactoryConfig) -> Self {
        ProxySynthesizer { catalog, config }
    }

    /// Synthesizes a proxy type named `<prefix><Abstract>_<unique_id>` and
    /// defines it in `module`.
    ///
    /// Every check runs before the name is claimed, so a rejected request
    /// leaves the module untouched.
    pub fn synthesize(
        &self,
        module: Option<&mut DynamicModule>,
        request: &SynthesisRequest,
        unique_id: i32,
    ) -> Result<SynthesizedProxyType, ProxyError> {
        let (abstract_type, concrete_type, interceptor_type) = request.require_types()?;
        let module = module.ok_or(ProxyError::MissingConstructionParameter {
            parameter: ConstructionParameter::ModuleContext,
        })?;

        let registry = self.catalog.registry();
        let abstract_def = registry.require(abstract_type)?;
        let concrete_def = registry.require(concrete_type)?;
        let interceptor_def = registry.require(interceptor_type)?;

        if !self.catalog.is_interceptor(interceptor_type) {
            return Err(ProxyError::NotAnInterceptor {
                type_name: interceptor_def.name.clone(),
            });
        }
        let shape = self.shape_of(abstract_type, abstract_def, concrete_type, concrete_def)?;

        let operations = registry.instance_operations(abstract_type)?;
        if let Some(op) = operations.iter().find(|op| op.is_generic()) {
            return Err(ProxyError::GenericOperation {
                type_name: abstract_def.name.clone(),
                operation: op.name.clone(),
            });
        }
        let properties = registry.instance_properties(abstract_type)?;

        let name = module.define_type(&format!(
            "{}{}_{}",
            self.config.type_prefix, abstract_def.name, unique_id
        ));
        let forwarding_field = (shape == ProxyShape::SealedClass)
            .then(|| FieldDescriptor::new(FORWARDING_FIELD, abstract_type));
        let interceptor_field = FieldDescriptor::new(INTERCEPTOR_FIELD, interceptor_type);

        let mut table = IndexMap::with_capacity(operations.len());
        for (index, op) in operations.into_iter().enumerate() {
            let base = self.base_target(shape, concrete_type, &op);
            let mut builder = MethodBuilder::new(
                &name,
                shape,
                forwarding_field.as_ref(),
                &interceptor_field,
                &op,
            );
            request.hooks.apply(&mut builder);
            let taps = builder.finish();

            let slot = OperationSlot(index as u32);
            let trampoline = Trampoline::new(slot, op, base, taps, self.config.coerce_arguments);
            table.insert(trampoline.name().to_string(), trampoline);
        }

        let mut constructors = vec![ProxyConstructor::Default];
        if shape == ProxyShape::SealedClass {
            constructors.push(ProxyConstructor::Decorator);
        }

        tracing::debug!(
            "synthesized {} in {} ({:?}, {} operations)",
            name,
            module.name(),
            shape,
            table.len()
        );

        Ok(SynthesizedProxyType {
            name,
            unique_id,
            shape,
            abstract_type,
            concrete_type,
            interceptor_type,
            forwarding_field,
            interceptor_field,
            operations: table,
            properties,
            constructors,
            catalog: Arc::clone(self.catalog),
        })
    }

    fn shape_of(
        &self,
        abstract_type: TypeId,
        abstract_def: &TypeDef,
        concrete_type: TypeId,
        concrete_def: &TypeDef,
    ) -> Result<ProxyShape, ProxyError> {
        for def in [abstract_def, concrete_def] {
            if def.is_struct() {
                return Err(ProxyError::StructContract {
                    type_name: def.name.clone(),
                });
            }
        }
        if concrete_def.is_sealed() && abstract_type == concrete_type {
            return Err(ProxyError::InvalidConfiguration {
                reason: format!(
                    "'{}' is sealed and cannot be both the contract and the implementation",
                    concrete_def.name
                ),
            });
        }
        if !abstract_def.is_extendable() {
            return Err(ProxyError::InvalidConfiguration {
                reason: format!("contract '{}' cannot be extended", abstract_def.name),
            });
        }
        if !self.catalog.registry().is_assignable(concrete_type, abstract_type) {
            return Err(ProxyError::InvalidConfiguration {
                reason: format!(
                    "'{}' does not implement '{}'",
                    concrete_def.name, abstract_def.name
                ),
            });
        }

        let shape = if concrete_def.is_interface() {
            ProxyShape::Interface
        } else if concrete_def.is_sealed() {
            ProxyShape::SealedClass
        } else {
            ProxyShape::InheritableClass
        };

        if shape != ProxyShape::Interface && !self.catalog.has_default_constructor(concrete_type) {
            return Err(ProxyError::NoDefaultConstructor {
                type_name: concrete_def.name.clone(),
            });
        }
        Ok(shape)
    }

    fn base_target(&self, shape: ProxyShape, concrete_type: TypeId, op: &OperationDef) -> BaseTarget {
        let body = match shape {
            ProxyShape::Interface => None,
            _ => self.catalog.resolve_body(concrete_type, &op.name),
        };
        match (shape, body) {
            (ProxyShape::InheritableClass, Some(body)) => BaseTarget::Base(body),
            (ProxyShape::SealedClass, Some(body)) => BaseTarget::Forwarding(body),
            _ => BaseTarget::Default(default_value(&op.return_type)),
        }
    }
}
