//! Public entry point: the proxy factory and its cache.
//!
//! [`ProxyFactory::create_proxy`] looks a request up by its exact
//! [`ProxyKey`]. Hits are served from a lock-free map. Misses take the
//! process-wide module lock, create the shared [`DynamicModule`] if this is the
//! first synthesis in the process, check the cache again, and synthesize while
//! still holding the lock, so two requests for the same key never synthesize
//! twice.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use interpose_core::id::HookId;
use interpose_core::type_id::{TypeId, TypeRegistry};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::activator::InstanceActivator;
use crate::catalog::TypeCatalog;
use crate::error::ProxyError;
use crate::hooks::{AfterInvokeHook, BeforeCollectHook, BeforeInvokeHook, HookFingerprint, HookSet};
use crate::instance::ProxyObject;
use crate::synth::{DynamicModule, ProxySynthesizer, ProxyTypeDescriptor, SynthesisRequest, SynthesizedProxyType};
use crate::value::Value;

/// The module every factory in the process defines its types in.
static MODULE_CONTEXT: Mutex<Option<DynamicModule>> = parking_lot::const_mutex(None);

/// The process-wide default factory, once installed.
static DEFAULT_FACTORY: OnceCell<ProxyFactory> = OnceCell::new();

/// Configuration for a [`ProxyFactory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Name given to the shared module. Only the factory that creates the
    /// module decides it.
    pub module_name: String,
    /// Prefix of synthesized type names. Default: `"Proxy"`.
    pub type_prefix: String,
    /// Coerce call arguments to the declared parameter types before capture.
    /// When off, only the argument count is checked.
    pub coerce_arguments: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        FactoryConfig {
            module_name: "InterposeDynamicModule".to_string(),
            type_prefix: "Proxy".to_string(),
            coerce_arguments: true,
        }
    }
}

/// What to build a proxy of. Unset types are reported by `create_proxy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyRequest {
    pub abstract_type: Option<TypeId>,
    pub concrete_type: Option<TypeId>,
    pub interceptor_type: Option<TypeId>,
}

impl ProxyRequest {
    pub fn new(abstract_type: TypeId, concrete_type: TypeId, interceptor_type: TypeId) -> Self {
        ProxyRequest {
            abstract_type: Some(abstract_type),
            concrete_type: Some(concrete_type),
            interceptor_type: Some(interceptor_type),
        }
    }

    pub fn with_abstract(mut self, ty: TypeId) -> Self {
        self.abstract_type = Some(ty);
        self
    }

    pub fn with_concrete(mut self, ty: TypeId) -> Self {
        self.concrete_type = Some(ty);
        self
    }

    pub fn with_interceptor(mut self, ty: TypeId) -> Self {
        self.interceptor_type = Some(ty);
        self
    }
}

/// Exact cache identity of a synthesized proxy type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyKey {
    pub abstract_type: TypeId,
    pub concrete_type: TypeId,
    pub interceptor_type: TypeId,
    pub hooks: HookFingerprint,
}

impl ProxyKey {
    /// Numeric postfix for the synthesized type's name.
    ///
    /// Bitwise OR of stable hashes of the three type names and every hook
    /// identity, masked into the non-negative `i32` range. Equal keys give
    /// equal ids; distinct keys may collide, which only affects naming.
    pub fn unique_id(&self, registry: &TypeRegistry) -> i32 {
        let mut id = [self.abstract_type, self.concrete_type, self.interceptor_type]
            .into_iter()
            .map(|ty| stable_hash(registry.name_of(ty).as_bytes()))
            .fold(0, |acc, h| acc | h);
        for (_, HookId(hook)) in &self.hooks.0 {
            id |= stable_hash(&hook.to_le_bytes());
        }
        id & i32::MAX
    }
}

fn stable_hash(bytes: &[u8]) -> i32 {
    let digest = blake3::hash(bytes);
    let b = digest.as_bytes();
    i32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// A cached proxy type plus its memoized activator.
#[derive(Clone)]
pub struct ProxyHandle {
    proxy_type: Arc<SynthesizedProxyType>,
    activator: Arc<InstanceActivator>,
}

impl ProxyHandle {
    fn new(proxy_type: Arc<SynthesizedProxyType>) -> Self {
        let activator = Arc::new(InstanceActivator::new(Arc::clone(&proxy_type)));
        ProxyHandle {
            proxy_type,
            activator,
        }
    }

    /// Activates a new proxy instance with the constructor matching `args`.
    pub fn new_instance(&self, args: &[Value]) -> Result<ProxyObject, ProxyError> {
        self.activator.activate(args)
    }

    pub fn proxy_type(&self) -> &Arc<SynthesizedProxyType> {
        &self.proxy_type
    }

    pub fn activator(&self) -> &InstanceActivator {
        &self.activator
    }

    pub fn descriptor(&self) -> ProxyTypeDescriptor {
        self.proxy_type.descriptor()
    }

    /// `true` if both handles refer to the same synthesized type.
    pub fn ptr_eq(&self, other: &ProxyHandle) -> bool {
        Arc::ptr_eq(&self.proxy_type, &other.proxy_type)
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("type", &self.proxy_type.name())
            .finish()
    }
}

/// Counters describing a factory's cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryStats {
    /// Proxy types this factory synthesized.
    pub synthesized: usize,
    /// Requests answered from the cache.
    pub cache_hits: usize,
    /// Entries currently cached.
    pub cached_types: usize,
}

/// Name and size of the shared module, if it exists yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub defined_types: usize,
}

/// Synthesizes and caches proxy types over one [`TypeCatalog`].
pub struct ProxyFactory {
    catalog: Arc<TypeCatalog>,
    config: FactoryConfig,
    hooks: RwLock<HookSet>,
    cache: DashMap<ProxyKey, ProxyHandle>,
    synthesized: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl ProxyFactory {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self::with_config(catalog, FactoryConfig::default())
    }

    pub fn with_config(catalog: Arc<TypeCatalog>, config: FactoryConfig) -> Self {
        ProxyFactory {
            catalog,
            config,
            hooks: RwLock::new(HookSet::new()),
            cache: DashMap::new(),
            synthesized: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    /// Installs the process-wide default factory over `catalog`.
    ///
    /// The first call wins. Later calls return the installed factory and
    /// ignore their catalog.
    pub fn install_default(catalog: Arc<TypeCatalog>) -> &'static ProxyFactory {
        DEFAULT_FACTORY.get_or_init(|| {
            tracing::debug!("installing default proxy factory");
            ProxyFactory::new(catalog)
        })
    }

    /// The default factory, if [`install_default`](Self::install_default) ran.
    pub fn default_instance() -> Option<&'static ProxyFactory> {
        DEFAULT_FACTORY.get()
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Registers a before-collect hook for subsequent requests.
    ///
    /// Types already cached are unaffected; the next request gets a new key.
    pub fn register_before_collect(&self, hook: Arc<dyn BeforeCollectHook>) -> HookId {
        self.hooks.write().push_before_collect(hook)
    }

    pub fn register_before_invoke(&self, hook: Arc<dyn BeforeInvokeHook>) -> HookId {
        self.hooks.write().push_before_invoke(hook)
    }

    pub fn register_after_invoke(&self, hook: Arc<dyn AfterInvokeHook>) -> HookId {
        self.hooks.write().push_after_invoke(hook)
    }

    /// Returns the proxy type for `request`, synthesizing it on first use.
    pub fn create_proxy(&self, request: ProxyRequest) -> Result<ProxyHandle, ProxyError> {
        let synthesis = SynthesisRequest {
            abstract_type: request.abstract_type,
            concrete_type: request.concrete_type,
            interceptor_type: request.interceptor_type,
            hooks: self.hooks.read().clone(),
        };
        let (abstract_type, concrete_type, interceptor_type) = synthesis.require_types()?;
        let key = ProxyKey {
            abstract_type,
            concrete_type,
            interceptor_type,
            hooks: synthesis.hooks.fingerprint(),
        };

        if let Some(handle) = self.cached(&key) {
            return Ok(handle);
        }

        let mut module = MODULE_CONTEXT.lock();
        if module.is_none() {
            tracing::debug!("creating dynamic module {}", self.config.module_name);
            *module = Some(DynamicModule::new(&self.config.module_name));
        }
        if let Some(handle) = self.cached(&key) {
            return Ok(handle);
        }

        let unique_id = key.unique_id(self.catalog.registry());
        let proxy_type = ProxySynthesizer::new(&self.catalog, &self.config).synthesize(
            module.as_mut(),
            &synthesis,
            unique_id,
        )?;
        let handle = ProxyHandle::new(Arc::new(proxy_type));
        self.cache.insert(key, handle.clone());
        self.synthesized.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    /// Proxy whose contract is also its implementation.
    pub fn create_proxy_of(&self, ty: TypeId, interceptor: TypeId) -> Result<ProxyHandle, ProxyError> {
        self.create_proxy(ProxyRequest::new(ty, ty, interceptor))
    }

    fn cached(&self, key: &ProxyKey) -> Option<ProxyHandle> {
        let handle = self.cache.get(key)?.value().clone();
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("proxy cache hit for {}", handle.proxy_type().name());
        Some(handle)
    }

    pub fn stats(&self) -> FactoryStats {
        FactoryStats {
            synthesized: self.synthesized.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cached_types: self.cache.len(),
        }
    }

    /// Handles of every cached proxy type, in no particular order.
    pub fn cached_types(&self) -> Vec<ProxyHandle> {
        self.cache.iter().map(|entry| entry.value().clone()).collect()
    }

    /// The shared module, once any factory has synthesized a type.
    pub fn module_info() -> Option<ModuleInfo> {
        MODULE_CONTEXT.lock().as_ref().map(|module| ModuleInfo {
            name: module.name().to_string(),
            defined_types: module.len(),
        })
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("config", &self.config)
            .field("hooks", &*self.hooks.read())
            .field("stats", &self.stats())
            .finish()
    }
}
