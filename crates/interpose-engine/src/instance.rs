//! Activated proxy instances.

use std::fmt;
use std::sync::Arc;

use crate::error::CallError;
use crate::interceptor::Interceptor;
use crate::synth::SynthesizedProxyType;
use crate::value::{ObjectRef, Value};

/// An instance of a synthesized proxy type.
///
/// Owns its interceptor, plus the base state (inheritable-class shape) or
/// the forwarding instance (sealed-class shape). Every operation call goes
/// through the operation's trampoline.
pub struct ProxyObject {
    proxy_type: Arc<SynthesizedProxyType>,
    base: Option<ObjectRef>,
    forwarding: Option<ObjectRef>,
    interceptor: Box<dyn Interceptor>,
}

impl ProxyObject {
    pub(crate) fn new(
        proxy_type: Arc<SynthesizedProxyType>,
        base: Option<ObjectRef>,
        forwarding: Option<ObjectRef>,
        interceptor: Box<dyn Interceptor>,
    ) -> Self {
        ProxyObject {
            proxy_type,
            base,
            forwarding,
            interceptor,
        }
    }

    /// Calls `operation` with positional `args`.
    pub fn call(&self, operation: &str, args: Vec<Value>) -> Result<Value, CallError> {
        let trampoline = self
            .proxy_type
            .operation(operation)
            .ok_or_else(|| CallError::UnknownOperation {
                type_name: self.proxy_type.name().to_string(),
                operation: operation.to_string(),
            })?;
        trampoline.invoke(self, args)
    }

    /// Reads a property through its intercepted getter.
    pub fn get(&self, property: &str) -> Result<Value, CallError> {
        self.call(&format!("get_{}", property), Vec::new())
    }

    /// Writes a property through its intercepted setter.
    pub fn set(&self, property: &str, value: Value) -> Result<(), CallError> {
        self.call(&format!("set_{}", property), vec![value]).map(|_| ())
    }

    pub fn proxy_type(&self) -> &Arc<SynthesizedProxyType> {
        &self.proxy_type
    }

    pub fn type_name(&self) -> &str {
        self.proxy_type.name()
    }

    /// Base state, present only for inheritable-class proxies.
    pub fn base_instance(&self) -> Option<&ObjectRef> {
        self.base.as_ref()
    }

    /// The wrapped instance, present only for sealed-class proxies.
    pub fn forwarding_instance(&self) -> Option<&ObjectRef> {
        self.forwarding.as_ref()
    }

    pub fn interceptor(&self) -> &dyn Interceptor {
        self.interceptor.as_ref()
    }
}

impl fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyObject")
            .field("type", &self.proxy_type.name())
            .field("base", &self.base)
            .field("forwarding", &self.forwarding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use interpose_core::contract::{PropertyDef, TypeDef};
    use interpose_core::types::ValueType;

    use crate::catalog::TypeCatalog;
    use crate::context::InvocationContext;
    use crate::factory::ProxyFactory;

    /// Answers getters with the operation name and records every call.
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Recorder {
        fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
            let entry = format!("{}{:?}", ctx.operation(), ctx.args());
            self.log.lock().unwrap().push(entry);
            Ok(Value::from(ctx.operation()))
        }
    }

    fn labelled() -> (ProxyObject, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut catalog = TypeCatalog::new();
        let labelled = catalog
            .define(TypeDef::interface("Labelled").property(PropertyDef::new("Label", ValueType::String)))
            .unwrap();
        let shared = Arc::clone(&log);
        let recorder = catalog
            .define_interceptor("Recorder", move || Recorder {
                log: Arc::clone(&shared),
            })
            .unwrap();

        let proxy = ProxyFactory::new(Arc::new(catalog))
            .create_proxy_of(labelled, recorder)
            .unwrap()
            .new_instance(&[])
            .unwrap();
        (proxy, log)
    }

    #[test]
    fn properties_route_through_accessors() {
        let (proxy, log) = labelled();

        assert_eq!(proxy.get("Label").unwrap(), Value::from("get_Label"));
        proxy.set("Label", Value::from("x")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["get_Label[]".to_string(), "set_Label[Str(\"x\")]".to_string()]
        );
    }

    #[test]
    fn unknown_members_are_not_dispatched() {
        let (proxy, log) = labelled();

        assert!(matches!(proxy.get("Missing"), Err(CallError::UnknownOperation { .. })));
        assert!(matches!(
            proxy.call("get_Label", vec![Value::I32(1)]),
            Err(CallError::ArgumentCount { expected: 0, actual: 1, .. })
        ));
        assert!(log.lock().unwrap().is_empty());
        assert!(proxy.base_instance().is_none());
        assert!(proxy.forwarding_instance().is_none());
    }
}
