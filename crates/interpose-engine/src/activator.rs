//! Activation of synthesized proxy types by constructor arity.
//!
//! The activator builds one construction function per constructor of a proxy
//! type, groups them by arity, and memoizes the table on first use. An
//! activation tries every function of the requested arity in declaration
//! order; a failed attempt is logged and the next candidate is tried.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{CallError, ProxyError};
use crate::instance::ProxyObject;
use crate::synth::{ProxyConstructor, SynthesizedProxyType};
use crate::value::Value;

type Activation = Box<dyn Fn(&[Value]) -> Result<ProxyObject, CallError> + Send + Sync>;

pub struct InstanceActivator {
    proxy_type: Arc<SynthesizedProxyType>,
    table: OnceCell<BTreeMap<usize, Vec<Activation>>>,
}

impl InstanceActivator {
    pub fn new(proxy_type: Arc<SynthesizedProxyType>) -> Self {
        InstanceActivator {
            proxy_type,
            table: OnceCell::new(),
        }
    }

    /// Constructs an instance with the first constructor accepting `args`.
    pub fn activate(&self, args: &[Value]) -> Result<ProxyObject, ProxyError> {
        let candidates = self.table().get(&args.len()).map(Vec::as_slice).unwrap_or(&[]);
        for (index, activation) in candidates.iter().enumerate() {
            match activation(args) {
                Ok(instance) => return Ok(instance),
                Err(err) => tracing::debug!(
                    "constructor candidate {} of {} failed: {}",
                    index,
                    self.proxy_type.name(),
                    err
                ),
            }
        }
        Err(ProxyError::NoConstructorFound {
            type_name: self.proxy_type.name().to_string(),
            arguments: args.to_vec(),
        })
    }

    /// Constructor arities this type can be activated with, ascending.
    pub fn arities(&self) -> Vec<usize> {
        self.table().keys().copied().collect()
    }

    fn table(&self) -> &BTreeMap<usize, Vec<Activation>> {
        self.table.get_or_init(|| {
            let mut table: BTreeMap<usize, Vec<Activation>> = BTreeMap::new();
            for &ctor in self.proxy_type.constructors() {
                table.entry(ctor.arity()).or_default().push(activation(&self.proxy_type, ctor));
            }
            table
        })
    }
}

fn activation(proxy_type: &Arc<SynthesizedProxyType>, ctor: ProxyConstructor) -> Activation {
    let proxy_type = Arc::clone(proxy_type);
    Box::new(move |args: &[Value]| proxy_type.construct(ctor, args))
}

impl fmt::Debug for InstanceActivator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceActivator")
            .field("type", &self.proxy_type.name())
            .field("built", &self.table.get().is_some())
            .finish()
    }
}
