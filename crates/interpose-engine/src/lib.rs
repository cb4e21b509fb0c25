//! Proxy synthesis and invocation-pipeline engine.
//!
//! Given a contract (an interface or an extendable class), an implementation
//! and an interceptor type, the engine synthesizes a proxy type whose every
//! public instance operation is routed through the interceptor. The
//! interceptor decides whether the original implementation runs, via
//! [`InvocationContext::next`], which runs it at most once.
//!
//! ```text
//! TypeCatalog --> ProxyFactory::create_proxy --> ProxyHandle::new_instance --> ProxyObject::call
//!                   (cache, module, synthesis)     (activation by arity)        (trampoline)
//! ```
//!
//! Types and behaviour are declared up front in a [`TypeCatalog`]; the
//! synthesized types are static descriptors executed by one generic
//! trampoline per operation.

pub mod activator;
pub mod catalog;
pub mod coercion;
pub mod context;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod instance;
pub mod interceptor;
pub mod synth;
pub mod value;

pub use activator::InstanceActivator;
pub use catalog::{ClassBuilder, OperationBody, TypeCatalog};
pub use context::{DeferredInvocation, DeferredState, InvocationContext};
pub use error::{CallError, ConstructionParameter, ProxyError};
pub use factory::{FactoryConfig, FactoryStats, ModuleInfo, ProxyFactory, ProxyHandle, ProxyKey, ProxyRequest};
pub use hooks::{
    AfterInvokeHook, BeforeCollectHook, BeforeInvokeHook, HookFingerprint, HookPhase, HookSet,
    MethodBuilder, Tap, TapFrame,
};
pub use instance::ProxyObject;
pub use interceptor::{Interceptor, Proceed};
pub use synth::{
    BaseKind, DynamicModule, FieldDescriptor, ProxyConstructor, ProxyShape, ProxySynthesizer,
    ProxyTypeDescriptor, SynthesisRequest, SynthesizedProxyType, Trampoline, TrampolineStep,
};
pub use value::{ObjectRef, Value};
