//! # Inspection Session
//!
//! All mutable engine state for one attached process: the runtime bridge,
//! the layout cache (keyed by type-info) and the object cache (keyed by object
//! address). Nothing is global, so two sessions never share state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use heapscope_core::prelude::*;
//!
//! let mut session = Session::new(host, InspectorConfig::from_env());
//! let text = session.summary(ObjectAddress::from(0x7f00_1000))?;
//! ```
//!
//! ## Cache lifetimes
//!
//! Layouts are valid for the life of the process and survive until
//! [`Session::clear_caches`]. Providers are keyed by address, and the session
//! cannot tell whether that address still holds the same object. Hosts that
//! know the process has run since the last request should call
//! [`Session::invalidate_objects`]; otherwise a reused address yields stale
//! results.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use heapscope_utils::Stopwatch;
use tracing::debug;

use crate::config::{CycleHandling, InspectorConfig};
use crate::error::{InspectError, InspectResult};
use crate::host::TargetHost;
use crate::inspect::identity;
use crate::inspect::layout::LayoutCache;
use crate::inspect::provider::{ArrayProvider, ObjectProvider, Provider, SharedProvider, StringProvider};
use crate::inspect::render::{CycleDetecting, DepthOnly, RecursionPolicy, RenderNode, Renderer};
use crate::inspect::shape::{self, Shape};
use crate::inspect::value::{Child, FieldValue};
use crate::runtime::Runtime;
use crate::types::{ObjectAddress, TypeInfoAddress};

/// Providers keyed by object address.
#[derive(Debug, Default)]
pub struct ObjectCache
{
    providers: HashMap<ObjectAddress, SharedProvider>,
}

impl ObjectCache
{
    /// Cached provider for `object`.
    pub fn get(&self, object: ObjectAddress) -> Option<SharedProvider>
    {
        self.providers.get(&object).cloned()
    }

    /// Whether a provider for `object` is cached.
    pub fn contains(&self, object: ObjectAddress) -> bool
    {
        self.providers.contains_key(&object)
    }

    fn insert(&mut self, object: ObjectAddress, provider: SharedProvider)
    {
        self.providers.insert(object, provider);
    }

    /// Number of cached providers.
    pub fn len(&self) -> usize
    {
        self.providers.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool
    {
        self.providers.is_empty()
    }

    /// Drop every cached provider.
    pub fn clear(&mut self)
    {
        self.providers.clear();
    }
}

/// Introspection state for one inspected process.
#[derive(Debug)]
pub struct Session<H>
{
    runtime: Runtime<H>,
    config: InspectorConfig,
    layouts: LayoutCache,
    objects: ObjectCache,
}

impl<H: TargetHost> Session<H>
{
    /// Start a session over `host`.
    pub fn new(host: H, config: InspectorConfig) -> Self
    {
        Self {
            runtime: Runtime::new(host, &config),
            config,
            layouts: LayoutCache::new(),
            objects: ObjectCache::default(),
        }
    }

    /// The runtime bridge.
    pub fn runtime(&self) -> &Runtime<H>
    {
        &self.runtime
    }

    /// The host debugger.
    pub fn host(&self) -> &H
    {
        self.runtime.host()
    }

    /// Active configuration.
    pub fn config(&self) -> &InspectorConfig
    {
        &self.config
    }

    /// Layouts seen so far.
    pub fn layouts(&self) -> &LayoutCache
    {
        &self.layouts
    }

    /// Providers built so far.
    pub fn objects(&self) -> &ObjectCache
    {
        &self.objects
    }

    /// Type-info of `object`, or `None` if it cannot be determined.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn resolve_type(&self, object: ObjectAddress) -> InspectResult<Option<TypeInfoAddress>>
    {
        identity::resolve(&self.runtime, object)
    }

    /// Shape of `object`.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` if the string class cannot be located; evaluation failures.
    pub fn classify(&self, object: ObjectAddress) -> InspectResult<Shape>
    {
        shape::classify(&self.runtime, object)
    }

    /// Provider for `object`, resolving its type on a cache miss.
    ///
    /// ## Errors
    ///
    /// `UnresolvableType` if `object` is null or its type cannot be determined,
    /// plus any failure building the provider.
    pub fn provider(&mut self, object: ObjectAddress) -> InspectResult<SharedProvider>
    {
        if let Some(provider) = self.objects.get(object) {
            return Ok(provider);
        }
        let type_info = self
            .resolve_type(object)?
            .ok_or(InspectError::UnresolvableType(object.address()))?;
        self.provider_with_type(object, type_info)
    }

    /// Provider for `object` of the already resolved `type_info`.
    ///
    /// The shape is classified once per object; the provider is then cached
    /// under the object's address.
    ///
    /// ## Errors
    ///
    /// Classification and construction failures. A `MemoryReadFailure` during
    /// construction leaves nothing in the cache.
    pub fn provider_with_type(
        &mut self,
        object: ObjectAddress,
        type_info: TypeInfoAddress,
    ) -> InspectResult<SharedProvider>
    {
        if let Some(provider) = self.objects.get(object) {
            return Ok(provider);
        }
        let shape = self.classify(object)?;
        self.provider_with_shape(object, type_info, shape)
    }

    /// Shape of `object`, taken from its cached provider when there is one.
    pub(crate) fn shape_of(&self, object: ObjectAddress) -> InspectResult<Shape>
    {
        match self.objects.get(object) {
            Some(provider) => {
                let shape = provider.borrow().shape();
                Ok(shape)
            }
            None => self.classify(object),
        }
    }

    /// Build and cache the provider of an already classified object.
    pub(crate) fn provider_with_shape(
        &mut self,
        object: ObjectAddress,
        type_info: TypeInfoAddress,
        shape: Shape,
    ) -> InspectResult<SharedProvider>
    {
        if let Some(provider) = self.objects.get(object) {
            return Ok(provider);
        }

        let watch = Stopwatch::start("select_provider");
        let provider = match shape {
            Shape::String => Provider::String(StringProvider::new(&self.runtime, object)?),
            Shape::Array => Provider::Array(ArrayProvider::new(
                &self.runtime,
                object,
                self.config.array_to_string_limit,
            )?),
            Shape::Object => Provider::Object(ObjectProvider::new(
                &self.runtime,
                &mut self.layouts,
                object,
                type_info,
            )?),
        };
        watch.finish();

        debug!(%object, %type_info, shape = %provider.shape(), "provider created");
        let provider = Rc::new(RefCell::new(provider));
        self.objects.insert(object, Rc::clone(&provider));
        Ok(provider)
    }

    /// Value-summary hook: the text a host shows for `object`.
    ///
    /// Null renders as `null`; an object whose type cannot be determined falls
    /// back to its raw pointer text. Strings are unquoted at the top level.
    ///
    /// ## Errors
    ///
    /// Failures building the top-level provider. Failures below the top level
    /// render as `<error: ...>` markers instead.
    pub fn summary(&mut self, object: ObjectAddress) -> InspectResult<String>
    {
        let depth = self.config.to_string_depth;
        let watch = Stopwatch::start("summary");
        let node = self.to_string_tree(object, depth)?;
        watch.finish();
        Ok(node.to_summary())
    }

    /// Render `object` with a depth budget of `depth`, using the
    /// configured cycle handling.
    ///
    /// ## Errors
    ///
    /// See [`summary`](Self::summary).
    pub fn to_string_tree(&mut self, object: ObjectAddress, depth: u32) -> InspectResult<RenderNode>
    {
        match self.config.cycle_handling {
            CycleHandling::DepthOnly => self.to_string_tree_with(object, depth, &mut DepthOnly),
            CycleHandling::Detect => self.to_string_tree_with(object, depth, &mut CycleDetecting::new()),
        }
    }

    /// Render `object` under a caller-supplied recursion policy.
    ///
    /// ## Errors
    ///
    /// See [`summary`](Self::summary).
    pub fn to_string_tree_with(
        &mut self,
        object: ObjectAddress,
        depth: u32,
        policy: &mut dyn RecursionPolicy,
    ) -> InspectResult<RenderNode>
    {
        if object.is_null() {
            return Ok(RenderNode::Null);
        }
        let provider = match self.provider(object) {
            Ok(provider) => provider,
            Err(InspectError::UnresolvableType(address)) => {
                debug!(%address, "falling back to raw value");
                return Ok(RenderNode::Scalar(FieldValue::Pointer(address)));
            }
            Err(err) => return Err(err),
        };
        Ok(Renderer::new(self, policy).render_root(&provider, depth))
    }

    /// Synthetic-children hook: number of children of `object`.
    ///
    /// ## Errors
    ///
    /// See [`provider`](Self::provider).
    pub fn num_children(&mut self, object: ObjectAddress) -> InspectResult<usize>
    {
        Ok(self.provider(object)?.borrow().num_children())
    }

    /// Synthetic-children hook: whether `object` has any children.
    ///
    /// ## Errors
    ///
    /// See [`provider`](Self::provider).
    pub fn has_children(&mut self, object: ObjectAddress) -> InspectResult<bool>
    {
        Ok(self.provider(object)?.borrow().has_children())
    }

    /// Synthetic-children hook: index of the child named `name`.
    ///
    /// Array children are named by their decimal index.
    ///
    /// ## Errors
    ///
    /// See [`provider`](Self::provider).
    pub fn child_index(&mut self, object: ObjectAddress, name: &str) -> InspectResult<Option<usize>>
    {
        Ok(self.provider(object)?.borrow().child_index(name))
    }

    /// Synthetic-children hook: child `index` of `object`.
    ///
    /// ## Errors
    ///
    /// See [`provider`](Self::provider); `MemoryReadFailure` if the child's
    /// value cannot be read.
    pub fn child_at(&mut self, object: ObjectAddress, index: usize) -> InspectResult<Option<Child>>
    {
        let provider = self.provider(object)?;
        let child = provider.borrow_mut().child_at(&self.runtime, index);
        child
    }

    /// Drop all cached layouts and providers.
    pub fn clear_caches(&mut self)
    {
        debug!(layouts = self.layouts.len(), objects = self.objects.len(), "clearing caches");
        self.layouts.clear();
        self.objects.clear();
    }

    /// Drop cached providers only; layouts stay valid for the process lifetime.
    pub fn invalidate_objects(&mut self)
    {
        self.objects.clear();
    }
}
