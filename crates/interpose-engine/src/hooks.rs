//! Synthesis-time hook pipeline.
//!
//! Hooks run once per operation while its trampoline is being built, never
//! at call time. What they leave behind are [`Tap`]s: labelled call-time
//! actions placed at the phase the hook ran in.
//!
//! Per operation the pipeline runs:
//!
//! 1. every before-collect hook, which may append before-invoke and
//!    after-invoke hooks for this operation only;
//! 2. every before-invoke hook (registered ones, then appended ones), which
//!    may append after-invoke hooks;
//! 3. every after-invoke hook (registered ones, then appended ones).
//!
//! Within a phase, hooks run in registration order and their taps execute
//! in the order they were emitted.

use std::fmt;
use std::sync::Arc;

use interpose_core::contract::OperationDef;
use interpose_core::id::HookId;
use serde::{Deserialize, Serialize};

use crate::error::CallError;
use crate::instance::ProxyObject;
use crate::synth::{FieldDescriptor, ProxyShape};
use crate::value::Value;

/// Where in a trampoline a hook's taps are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPhase {
    /// Before the arguments are captured.
    BeforeCollect,
    /// After the deferred base invocation is prepared, before the interceptor.
    BeforeInvoke,
    /// After the interceptor returned and its result was coerced.
    AfterInvoke,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::BeforeCollect => "before-collect",
            HookPhase::BeforeInvoke => "before-invoke",
            HookPhase::AfterInvoke => "after-invoke",
        };
        f.write_str(name)
    }
}

/// Runs first for every operation; may append hooks for that operation only.
///
/// Hooks run while the factory holds its process-wide synthesis lock, which
/// is not reentrant: a hook must not call back into
/// [`ProxyFactory::create_proxy`](crate::factory::ProxyFactory::create_proxy)
/// or [`ProxyFactory::module_info`](crate::factory::ProxyFactory::module_info),
/// or it deadlocks.
pub trait BeforeCollectHook: Send + Sync {
    fn before_collect(
        &self,
        builder: &mut MethodBuilder<'_>,
        pre_invoke: &mut Vec<Arc<dyn BeforeInvokeHook>>,
        post_invoke: &mut Vec<Arc<dyn AfterInvokeHook>>,
    );
}

/// Runs once arguments are captured, before the interceptor call.
///
/// Runs under the same non-reentrant synthesis lock as [`BeforeCollectHook`].
pub trait BeforeInvokeHook: Send + Sync {
    fn before_invoke(
        &self,
        builder: &mut MethodBuilder<'_>,
        post_invoke: &mut Vec<Arc<dyn AfterInvokeHook>>,
    );
}

/// Runs after the interceptor call is wired, before the return.
///
/// Runs under the same non-reentrant synthesis lock as [`BeforeCollectHook`].
pub trait AfterInvokeHook: Send + Sync {
    fn after_invoke(&self, builder: &mut MethodBuilder<'_>);
}

/// What a tap sees when it runs.
pub struct TapFrame<'a> {
    pub instance: &'a ProxyObject,
    pub operation: &'a str,
    /// Raw arguments for before-collect taps, captured ones afterwards.
    pub args: &'a [Value],
    /// The coerced result, for after-invoke taps only.
    pub result: Option<&'a Value>,
}

type TapAction = Arc<dyn Fn(&TapFrame<'_>) -> Result<(), CallError> + Send + Sync>;

/// A labelled call-time action emitted by a hook.
///
/// A tap returning an error aborts the call with that error.
#[derive(Clone)]
pub struct Tap {
    label: String,
    phase: HookPhase,
    action: TapAction,
}

impl Tap {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    pub(crate) fn run(&self, frame: &TapFrame<'_>) -> Result<(), CallError> {
        (self.action)(frame)
    }
}

impl fmt::Debug for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tap")
            .field("label", &self.label)
            .field("phase", &self.phase)
            .finish()
    }
}

/// Taps collected for one operation, by phase.
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseTaps {
    pub entry: Vec<Tap>,
    pub before_invoke: Vec<Tap>,
    pub after_invoke: Vec<Tap>,
}

/// Build context handed to hooks for one operation of one proxy type.
pub struct MethodBuilder<'a> {
    proxy_name: &'a str,
    shape: ProxyShape,
    forwarding_field: Option<&'a FieldDescriptor>,
    interceptor_field: &'a FieldDescriptor,
    operation: &'a OperationDef,
    phase: HookPhase,
    taps: PhaseTaps,
}

impl<'a> MethodBuilder<'a> {
    pub(crate) fn new(
        proxy_name: &'a str,
        shape: ProxyShape,
        forwarding_field: Option<&'a FieldDescriptor>,
        interceptor_field: &'a FieldDescriptor,
        operation: &'a OperationDef,
    ) -> Self {
        MethodBuilder {
            proxy_name,
            shape,
            forwarding_field,
            interceptor_field,
            operation,
            phase: HookPhase::BeforeCollect,
            taps: PhaseTaps::default(),
        }
    }

    /// Name of the proxy type being built.
    pub fn proxy_name(&self) -> &'a str {
        self.proxy_name
    }

    pub fn shape(&self) -> ProxyShape {
        self.shape
    }

    /// The forwarding field, present only for sealed-class proxies.
    pub fn forwarding_field(&self) -> Option<&'a FieldDescriptor> {
        self.forwarding_field
    }

    pub fn interceptor_field(&self) -> &'a FieldDescriptor {
        self.interceptor_field
    }

    /// The operation whose trampoline is being built.
    pub fn operation(&self) -> &'a OperationDef {
        self.operation
    }

    /// The phase currently running.
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Places a call-time action at the current phase.
    pub fn emit<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: Fn(&TapFrame<'_>) -> Result<(), CallError> + Send + Sync + 'static,
    {
        let tap = Tap {
            label: label.into(),
            phase: self.phase,
            action: Arc::new(action),
        };
        match self.phase {
            HookPhase::BeforeCollect => self.taps.entry.push(tap),
            HookPhase::BeforeInvoke => self.taps.before_invoke.push(tap),
            HookPhase::AfterInvoke => self.taps.after_invoke.push(tap),
        }
    }

    fn enter(&mut self, phase: HookPhase) {
        self.phase = phase;
    }

    pub(crate) fn finish(self) -> PhaseTaps {
        self.taps
    }
}

/// Ordered identity of a hook set, part of the proxy cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookFingerprint(pub Vec<(HookPhase, HookId)>);

/// Registered hooks, by phase, in registration order.
///
/// Cloning is cheap and yields an independent snapshot: hooks registered
/// on the original later do not appear in the clone.
#[derive(Clone, Default)]
pub struct HookSet {
    before_collect: Vec<Arc<dyn BeforeCollectHook>>,
    before_invoke: Vec<Arc<dyn BeforeInvokeHook>>,
    after_invoke: Vec<Arc<dyn AfterInvokeHook>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_before_collect(&mut self, hook: Arc<dyn BeforeCollectHook>) -> HookId {
        let id = HookId::of(&hook);
        self.before_collect.push(hook);
        id
    }

    pub fn push_before_invoke(&mut self, hook: Arc<dyn BeforeInvokeHook>) -> HookId {
        let id = HookId::of(&hook);
        self.before_invoke.push(hook);
        id
    }

    pub fn push_after_invoke(&mut self, hook: Arc<dyn AfterInvokeHook>) -> HookId {
        let id = HookId::of(&hook);
        self.after_invoke.push(hook);
        id
    }

    pub fn len(&self) -> usize {
        self.before_collect.len() + self.before_invoke.len() + self.after_invoke.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fingerprint(&self) -> HookFingerprint {
        let ids = self
            .before_collect
            .iter()
            .map(|h| (HookPhase::BeforeCollect, HookId::of(h)))
            .chain(
                self.before_invoke
                    .iter()
                    .map(|h| (HookPhase::BeforeInvoke, HookId::of(h))),
            )
            .chain(
                self.after_invoke
                    .iter()
                    .map(|h| (HookPhase::AfterInvoke, HookId::of(h))),
            )
            .collect();
        HookFingerprint(ids)
    }

    /// Runs the three phases for one operation.
    pub(crate) fn apply(&self, builder: &mut MethodBuilder<'_>) {
        let mut pre_invoke = self.before_invoke.clone();
        let mut post_invoke = self.after_invoke.clone();

        builder.enter(HookPhase::BeforeCollect);
        for hook in &self.before_collect {
            hook.before_collect(builder, &mut pre_invoke, &mut post_invoke);
        }

        builder.enter(HookPhase::BeforeInvoke);
        for hook in &pre_invoke {
            hook.before_invoke(builder, &mut post_invoke);
        }

        builder.enter(HookPhase::AfterInvoke);
        for hook in &post_invoke {
            hook.after_invoke(builder);
        }
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}
