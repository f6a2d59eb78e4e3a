/*!
 * Framework Context
 * Explicit process-wide state: backend, resolver and container registry
 */

use crate::backend::{BackendGate, IsolationBackend};
use crate::container::registry::{ContainerRegistry, SharedEntry};
use crate::container::resolver::{DefinitionResolver, SearchPathResolver};
use crate::container::Container;
use crate::core::{ContainerError, ContainerResult};
use log::{info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) struct FrameworkInner<B: IsolationBackend> {
    pub(crate) backend: BackendGate<B>,
    pub(crate) resolver: Box<dyn DefinitionResolver>,
    pub(crate) registry: ContainerRegistry<B::Context>,
    initialized: AtomicBool,
}

impl<B: IsolationBackend> Drop for FrameworkInner<B> {
    fn drop(&mut self) {
        // Last clone dropped without deinitialize
        if !*self.initialized.get_mut() {
            return;
        }
        for (key, entry) in self.registry.drain() {
            let Some(context) = entry.lock().take_context() else {
                continue;
            };
            warn!("Container {} leaked past its framework; releasing", key);
            if let Err(e) = self.backend.with(|b| b.release(context)) {
                warn!("Failed to release container {}: {}", key, e);
            }
        }
    }
}

/// Initialized container framework
///
/// Cheap to clone; clones share one registry and backend. Every container
/// operation is a method on this type.
pub struct Framework<B: IsolationBackend> {
    pub(crate) inner: Arc<FrameworkInner<B>>,
}

impl<B: IsolationBackend> Clone for Framework<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: IsolationBackend> fmt::Debug for Framework<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("backend", &self.inner.backend.backend().name())
            .field("containers", &self.inner.registry.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Builder for Framework
pub struct FrameworkBuilder<B: IsolationBackend> {
    backend: B,
    resolver: Option<Box<dyn DefinitionResolver>>,
}

impl<B: IsolationBackend> FrameworkBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            resolver: None,
        }
    }

    /// Replace the search-path resolver
    pub fn with_resolver(mut self, resolver: impl DefinitionResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Build the initialized framework
    pub fn initialize(self) -> Framework<B> {
        let backend = BackendGate::new(self.backend);

        info!(
            "Container framework initialized with {} backend ({})",
            backend.backend().name(),
            if backend.is_serialized() {
                "serialized"
            } else {
                "concurrent"
            }
        );

        Framework {
            inner: Arc::new(FrameworkInner {
                backend,
                resolver: self
                    .resolver
                    .unwrap_or_else(|| Box::new(SearchPathResolver) as Box<dyn DefinitionResolver>),
                registry: ContainerRegistry::new(),
                initialized: AtomicBool::new(true),
            }),
        }
    }
}

/// Framework driving the Linux host backend
#[cfg(target_os = "linux")]
pub type HostFramework = Framework<crate::backend::HostBackend>;

#[cfg(target_os = "linux")]
impl Framework<crate::backend::HostBackend> {
    /// Initialize with the Linux host backend
    pub fn initialize() -> ContainerResult<Self> {
        let backend = crate::backend::HostBackend::new()?;
        Ok(FrameworkBuilder::new(backend).initialize())
    }
}

impl<B: IsolationBackend> Framework<B> {
    pub fn builder(backend: B) -> FrameworkBuilder<B> {
        FrameworkBuilder::new(backend)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// The backend, for fault injection and inspection
    pub fn backend(&self) -> &B {
        self.inner.backend.backend()
    }

    /// Tear down the framework
    ///
    /// Containers still registered are a caller error: each is destroyed
    /// with a warning. Remaining clones reject every operation afterwards.
    pub fn deinitialize(self) {
        if !self.inner.initialized.swap(false, Ordering::AcqRel) {
            return;
        }

        let leftovers = self.inner.registry.drain();
        if !leftovers.is_empty() {
            warn!(
                "Deinitializing with {} container(s) still registered; destroying them",
                leftovers.len()
            );
        }
        for (key, entry) in leftovers {
            if let Err(e) = self.release_entry(&entry) {
                warn!("Failed to release container {}: {}", key, e);
            }
        }

        info!("Container framework deinitialized");
    }

    pub(crate) fn ensure_initialized(&self) -> ContainerResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ContainerError::unknown("container framework is not initialized"))
        }
    }

    /// Lookup that fails for stale handles and after teardown
    pub(crate) fn entry(&self, handle: &Container) -> ContainerResult<SharedEntry<B::Context>> {
        self.ensure_initialized()?;
        self.inner.registry.get(handle)
    }

    /// Stop and release an already unlinked entry
    pub(crate) fn release_entry(&self, entry: &SharedEntry<B::Context>) -> ContainerResult<()> {
        let mut entry = entry.lock();
        let Some(context) = entry.take_context() else {
            return Ok(());
        };
        let id = entry.id.clone();
        entry.mark_stopped();
        drop(entry);

        self.inner.backend.with(|b| b.release(context)).map_err(|e| {
            ContainerError::unknown(format!("releasing container {}: {}", id, e))
        })
    }
}
