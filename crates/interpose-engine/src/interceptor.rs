//! The interceptor contract.
//!
//! Every call to a proxied operation is routed to exactly one
//! [`Interceptor::invoke`]. Whatever it returns is coerced to the operation's
//! declared return type; an error it returns propagates to the caller as is.

use std::fmt;

use crate::context::InvocationContext;
use crate::error::CallError;
use crate::value::Value;

/// Receives every call made through a proxy.
///
/// One interceptor instance is created per proxy instance, through the
/// default constructor registered with
/// [`TypeCatalog::define_interceptor`](crate::catalog::TypeCatalog::define_interceptor).
/// The same instance may be invoked from several threads at once.
pub trait Interceptor: Send + Sync {
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError>;
}

impl<F> Interceptor for F
where
    F: Fn(&InvocationContext<'_>) -> Result<Value, CallError> + Send + Sync,
{
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        self(ctx)
    }
}

impl fmt::Debug for dyn Interceptor + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Interceptor")
    }
}

/// Runs the original implementation and returns its result unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proceed;

impl Interceptor for Proceed {
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        ctx.next()
    }
}
