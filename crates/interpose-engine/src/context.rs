//! Per-call interception payload.
//!
//! An [`InvocationContext`] is built by the trampoline for every call to a
//! proxied operation and handed to the interceptor. It carries the captured
//! arguments and a [`DeferredInvocation`] wrapping the original
//! implementation, which runs only if the interceptor asks for it through
//! [`InvocationContext::next`].
//!
//! # Deferred invocation lifecycle
//!
//! `NotStarted -> Started -> Completed`. The first `start()` moves the
//! deferred call to `Started`, runs it outside the lock, and stores the
//! outcome. Concurrent callers that find it `Started` wait for the outcome;
//! every caller observes the same result. The original operation therefore
//! runs at most once per call, and never if nobody starts it.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::error::CallError;
use crate::instance::ProxyObject;
use crate::value::{ObjectRef, Value};

/// Observable state of a [`DeferredInvocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredState {
    NotStarted,
    Started,
    Completed,
}

type BaseCall = Box<dyn FnOnce() -> Result<Value, CallError> + Send>;

enum Slot {
    Pending(BaseCall),
    Running,
    Done(Result<Value, CallError>),
}

/// Lazily-started, at-most-once, memoized call to an original implementation.
pub struct DeferredInvocation {
    slot: Mutex<Slot>,
    finished: Condvar,
}

impl DeferredInvocation {
    /// Wraps `call` without running it.
    pub fn new<F>(call: F) -> Self
    where
        F: FnOnce() -> Result<Value, CallError> + Send + 'static,
    {
        DeferredInvocation {
            slot: Mutex::new(Slot::Pending(Box::new(call))),
            finished: Condvar::new(),
        }
    }

    /// An invocation that is already complete with `value`.
    ///
    /// Used for operations without an original implementation, which resolve
    /// to their return type's zero value.
    pub fn resolved(value: Value) -> Self {
        DeferredInvocation {
            slot: Mutex::new(Slot::Done(Ok(value))),
            finished: Condvar::new(),
        }
    }

    pub fn state(&self) -> DeferredState {
        match &*self.slot.lock() {
            Slot::Pending(_) => DeferredState::NotStarted,
            Slot::Running => DeferredState::Started,
            Slot::Done(_) => DeferredState::Completed,
        }
    }

    /// Starts the call if nobody has, then returns its outcome.
    ///
    /// Calling `start` again, from any thread, returns the same outcome
    /// without running the original operation again. Must not be called from
    /// inside the deferred call itself.
    pub fn start(&self) -> Result<Value, CallError> {
        let mut slot = self.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Running) {
                Slot::Pending(call) => {
                    drop(slot);
                    return self.run(call);
                }
                Slot::Running => self.finished.wait(&mut slot),
                Slot::Done(outcome) => {
                    *slot = Slot::Done(outcome.clone());
                    return outcome;
                }
            }
        }
    }

    fn run(&self, call: BaseCall) -> Result<Value, CallError> {
        // Publishes a failure if `call` unwinds so waiters are not left blocked.
        struct Completion<'a> {
            owner: &'a DeferredInvocation,
            outcome: Option<Result<Value, CallError>>,
        }

        impl Drop for Completion<'_> {
            fn drop(&mut self) {
                let outcome = self
                    .outcome
                    .take()
                    .unwrap_or_else(|| Err(CallError::fault("deferred base invocation panicked")));
                *self.owner.slot.lock() = Slot::Done(outcome);
                self.owner.finished.notify_all();
            }
        }

        let mut completion = Completion {
            owner: self,
            outcome: None,
        };
        let outcome = call();
        completion.outcome = Some(outcome.clone());
        outcome
    }
}

impl fmt::Debug for DeferredInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredInvocation")
            .field("state", &self.state())
            .finish()
    }
}

/// Everything an interceptor learns about one call.
pub struct InvocationContext<'a> {
    instance: &'a ProxyObject,
    forwarding: Option<&'a ObjectRef>,
    operation: &'a str,
    args: Arc<[Value]>,
    deferred: Arc<DeferredInvocation>,
}

impl<'a> InvocationContext<'a> {
    pub(crate) fn new(
        instance: &'a ProxyObject,
        forwarding: Option<&'a ObjectRef>,
        operation: &'a str,
        args: Arc<[Value]>,
        deferred: Arc<DeferredInvocation>,
    ) -> Self {
        InvocationContext {
            instance,
            forwarding,
            operation,
            args,
            deferred,
        }
    }

    /// The proxy instance the operation was called on.
    pub fn instance(&self) -> &'a ProxyObject {
        self.instance
    }

    /// The wrapped sealed instance, present only for sealed-class proxies.
    pub fn forwarding_instance(&self) -> Option<&'a ObjectRef> {
        self.forwarding
    }

    /// Name of the called operation.
    pub fn operation(&self) -> &'a str {
        self.operation
    }

    /// Captured arguments in declaration order.
    ///
    /// The deferred invocation holds its own copy; changing a clone of these
    /// has no effect on it.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Runs the original implementation, or joins a run already in progress.
    pub fn next(&self) -> Result<Value, CallError> {
        self.deferred.start()
    }

    pub fn deferred(&self) -> &Arc<DeferredInvocation> {
        &self.deferred
    }
}

impl fmt::Debug for InvocationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("type", &self.instance.type_name())
            .field("operation", &self.operation)
            .field("args", &self.args)
            .field("deferred", &self.deferred)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use proptest::prelude::*;

    fn counting(counter: &Arc<AtomicUsize>, value: i32) -> DeferredInvocation {
        let counter = Arc::clone(counter);
        DeferredInvocation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::I32(value))
        })
    }

    #[test]
    fn never_started_never_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&calls, 1);

        assert_eq!(deferred.state(), DeferredState::NotStarted);
        drop(deferred);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_runs_once_and_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&calls, 7);

        assert_eq!(deferred.start().unwrap(), Value::I32(7));
        assert_eq!(deferred.start().unwrap(), Value::I32(7));
        assert_eq!(deferred.state(), DeferredState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_memoized_too() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deferred = DeferredInvocation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CallError::fault("boom"))
        });

        for _ in 0..3 {
            let err = deferred.start().unwrap_err();
            assert_eq!(err.to_string(), "boom");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolved_is_complete_immediately() {
        let deferred = DeferredInvocation::resolved(Value::I64(0));
        assert_eq!(deferred.state(), DeferredState::Completed);
        assert_eq!(deferred.start().unwrap(), Value::I64(0));
    }

    #[test]
    fn concurrent_start_runs_exactly_once() {
        const THREADS: usize = 8;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deferred = Arc::new(DeferredInvocation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(Value::from("done"))
        }));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let deferred = Arc::clone(&deferred);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    deferred.start()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), Value::from("done"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_call_completes_with_fault() {
        let deferred = Arc::new(DeferredInvocation::new(|| panic!("original exploded")));
        let first = Arc::clone(&deferred);
        let joined = thread::spawn(move || first.start()).join();
        assert!(joined.is_err());

        assert_eq!(deferred.state(), DeferredState::Completed);
        let err = deferred.start().unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }

    proptest! {
        #[test]
        fn any_number_of_starts_runs_at_most_once(starts in 0usize..16) {
            let calls = Arc::new(AtomicUsize::new(0));
            let deferred = counting(&calls, 3);
            for _ in 0..starts {
                prop_assert_eq!(deferred.start().unwrap(), Value::I32(3));
            }
            prop_assert_eq!(calls.load(Ordering::SeqCst), usize::from(starts > 0));
        }
    }
}
