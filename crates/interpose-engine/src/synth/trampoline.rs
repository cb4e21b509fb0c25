//! Per-operation trampolines.
//!
//! A [`Trampoline`] is the synthesized implementation of one operation. Every
//! call runs the same fixed sequence, with hook taps spliced in at their
//! phases:
//!
//! ```text
//! entry taps -> capture arguments -> defer base call -> before-invoke taps
//!   -> interceptor -> coerce (or discard) result -> after-invoke taps -> return
//! ```

use std::sync::Arc;

use interpose_core::contract::OperationDef;
use interpose_core::id::OperationSlot;
use interpose_core::types::ValueType;
use serde::{Deserialize, Serialize};

use crate::catalog::OperationBody;
use crate::coercion::coerce;
use crate::context::{DeferredInvocation, InvocationContext};
use crate::error::CallError;
use crate::hooks::{HookPhase, PhaseTaps, Tap, TapFrame};
use crate::instance::ProxyObject;
use crate::value::Value;

/// What the deferred base invocation of an operation calls.
#[derive(Clone)]
pub enum BaseTarget {
    /// The concrete class's body, on the proxy's own base state.
    Base(OperationBody),
    /// The sealed concrete class's body, on the forwarding instance.
    Forwarding(OperationBody),
    /// No implementation; resolves to the return type's zero value.
    Default(Value),
}

impl BaseTarget {
    pub fn kind(&self) -> BaseKind {
        match self {
            BaseTarget::Base(_) => BaseKind::Base,
            BaseTarget::Forwarding(_) => BaseKind::Forwarding,
            BaseTarget::Default(_) => BaseKind::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseKind {
    Base,
    Forwarding,
    Default,
}

/// One step of a trampoline, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrampolineStep {
    Tap { phase: HookPhase, label: String },
    CaptureArguments { count: usize },
    DeferBase { target: BaseKind },
    InvokeInterceptor,
    CoerceReturn { to: ValueType },
    DiscardResult,
    Return,
}

/// Synthesized implementation of one operation.
pub struct Trampoline {
    slot: OperationSlot,
    operation: OperationDef,
    base: BaseTarget,
    taps: PhaseTaps,
    coerce_arguments: bool,
}

impl Trampoline {
    pub(crate) fn new(
        slot: OperationSlot,
        operation: OperationDef,
        base: BaseTarget,
        taps: PhaseTaps,
        coerce_arguments: bool,
    ) -> Self {
        Trampoline {
            slot,
            operation,
            base,
            taps,
            coerce_arguments,
        }
    }

    pub fn slot(&self) -> OperationSlot {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.operation.name
    }

    pub fn operation(&self) -> &OperationDef {
        &self.operation
    }

    pub fn base(&self) -> &BaseTarget {
        &self.base
    }

    /// The emitted step sequence.
    pub fn steps(&self) -> Vec<TrampolineStep> {
        fn tap_steps(taps: &[Tap]) -> impl Iterator<Item = TrampolineStep> + '_ {
            taps.iter().map(|p| TrampolineStep::Tap {
                phase: p.phase(),
                label: p.label().to_string(),
            })
        }

        let mut steps: Vec<TrampolineStep> = tap_steps(&self.taps.entry).collect();
        steps.push(TrampolineStep::CaptureArguments {
            count: self.operation.arity(),
        });
        steps.push(TrampolineStep::DeferBase {
            target: self.base.kind(),
        });
        steps.extend(tap_steps(&self.taps.before_invoke));
        steps.push(TrampolineStep::InvokeInterceptor);
        if self.operation.returns_value() {
            steps.push(TrampolineStep::CoerceReturn {
                to: self.operation.return_type.clone(),
            });
        } else {
            steps.push(TrampolineStep::DiscardResult);
        }
        steps.extend(tap_steps(&self.taps.after_invoke));
        steps.push(TrampolineStep::Return);
        steps
    }

    /// Runs the operation on `proxy`.
    pub(crate) fn invoke(&self, proxy: &ProxyObject, args: Vec<Value>) -> Result<Value, CallError> {
        let name = self.operation.name.as_str();
        tracing::trace!("dispatching {}.{}", proxy.type_name(), name);

        for tap in &self.taps.entry {
            tap.run(&TapFrame {
                instance: proxy,
                operation: name,
                args: &args,
                result: None,
            })?;
        }

        let args = self.capture(proxy, args)?;
        let deferred = Arc::new(self.defer(proxy, &args)?);

        for tap in &self.taps.before_invoke {
            tap.run(&TapFrame {
                instance: proxy,
                operation: name,
                args: &args,
                result: None,
            })?;
        }

        let ctx = InvocationContext::new(
            proxy,
            proxy.forwarding_instance(),
            name,
            Arc::clone(&args),
            deferred,
        );
        let raw = proxy.interceptor().invoke(&ctx)?;

        let result = if self.operation.returns_value() {
            let registry = proxy.proxy_type().catalog().registry();
            coerce(raw, &self.operation.return_type, registry).map_err(|mismatch| {
                CallError::Coercion {
                    operation: name.to_string(),
                    expected: mismatch.expected,
                    actual: mismatch.actual,
                }
            })?
        } else {
            Value::Unit
        };

        for tap in &self.taps.after_invoke {
            tap.run(&TapFrame {
                instance: proxy,
                operation: name,
                args: &args,
                result: Some(&result),
            })?;
        }
        Ok(result)
    }

    fn capture(&self, proxy: &ProxyObject, args: Vec<Value>) -> Result<Arc<[Value]>, CallError> {
        if self.coerce_arguments {
            let catalog = proxy.proxy_type().catalog();
            let coerced = catalog.coerce_arguments(&self.operation.name, &self.operation.params, &args)?;
            return Ok(coerced.into());
        }
        if args.len() != self.operation.arity() {
            return Err(CallError::ArgumentCount {
                operation: self.operation.name.clone(),
                expected: self.operation.arity(),
                actual: args.len(),
            });
        }
        Ok(args.into())
    }

    fn defer(&self, proxy: &ProxyObject, args: &Arc<[Value]>) -> Result<DeferredInvocation, CallError> {
        let (body, target) = match &self.base {
            BaseTarget::Default(value) => return Ok(DeferredInvocation::resolved(value.clone())),
            BaseTarget::Base(body) => (body, proxy.base_instance()),
            BaseTarget::Forwarding(body) => (body, proxy.forwarding_instance()),
        };
        let target = target.cloned().ok_or_else(|| {
            CallError::fault(format!(
                "'{}' has no instance to run '{}' on",
                proxy.type_name(),
                self.operation.name
            ))
        })?;
        let body = Arc::clone(body);
        let args = Arc::clone(args);
        Ok(DeferredInvocation::new(move || body(&target, &args[..])))
    }
}

impl std::fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trampoline")
            .field("slot", &self.slot)
            .field("operation", &self.operation.name)
            .field("base", &self.base.kind())
            .field("steps", &self.steps().len())
            .finish()
    }
}
