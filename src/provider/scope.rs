//! Scoped service resolution and lifecycle management.
//!
//! Scopes form a tree rooted at the container. Each node memoizes its scoped
//! instances, remembers the disposable instances it constructed and the child
//! scopes it started, and releases all of them, newest first, when it is
//! disposed.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use super::{Container, Ownership, Resolved, Shared};
use crate::descriptor::{Component, ComponentInfo, Constructor};
use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, ResolutionGuard};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::logger::{Logger, TracingLogger};
use crate::registration::{AnyArc, Binding, Map, Registration, RegistrationId};
use crate::resolvable::downcast_service;
use crate::traits::{Dispose, ResolverCore};

/// One node of the scope tree.
pub(crate) struct ScopeNode {
    id: u64,
    depth: usize,
    shared: Arc<Shared>,
    /// Holds the parent's lease, so ancestors outlive their children
    parent: Option<Scope>,
    memo: Mutex<Map<RegistrationId, AnyArc>>,
    /// One construction lock per memoized registration owned by this node
    construction: Mutex<Map<RegistrationId, Arc<ReentrantMutex<()>>>>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
    dispose_lock: Mutex<()>,
}

impl ScopeNode {
    fn new(shared: Arc<Shared>, parent: Option<Scope>) -> Self {
        Self {
            id: shared.next_scope_id(),
            depth: parent.as_ref().map_or(0, |p| p.node.depth + 1),
            shared,
            parent,
            memo: Mutex::new(Map::default()),
            construction: Mutex::new(Map::default()),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
            dispose_lock: Mutex::new(()),
        }
    }

    #[inline]
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes tracked instances and child scopes in reverse order, once.
    pub(crate) fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        let _exclusive = self.dispose_lock.lock();
        if self.is_disposed() {
            return;
        }

        // Flag under the bag lock so late registrations see it and dispose themselves.
        let mut bag = {
            let mut bag = self.disposables.lock();
            self.disposed.store(true, Ordering::Release);
            std::mem::take(&mut *bag)
        };
        let released = bag.len();
        bag.run_all_reverse();

        let memo = std::mem::take(&mut *self.memo.lock());
        drop(memo);
        self.construction.lock().clear();

        tracing::debug!(scope = self.id, depth = self.depth, released, "scope disposed");
    }
}

impl Drop for ScopeNode {
    fn drop(&mut self) {
        if !self.is_disposed() {
            self.dispose();
        }
    }
}

/// Shared by the handles that keep a scope open; the last one disposes it.
struct Lease {
    node: Weak<ScopeNode>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(node) = self.node.upgrade() {
            node.dispose();
        }
    }
}

/// Handle to a node of the scope tree.
///
/// A scope resolves services, memoizes scoped instances, and owns the
/// disposable instances it constructed. Singletons always resolve in the
/// root scope so every caller observes the same instance. Cloning a scope
/// clones the handle, not the node.
///
/// Dropping the last handle to a scope that was never disposed disposes it.
/// A child keeps its ancestors alive; disposing an ancestor disposes the
/// child. Handles injected into services (a `Scope` or `Container`
/// parameter, or the scope behind a [`Supplier`](crate::Supplier) or
/// [`Lazy`](crate::Lazy)) do not count: they keep resolving while the scope
/// is open and fail with [`DiError::DisposedScope`] afterwards.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct RequestContext;
/// impl Component for RequestContext {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default()
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_scoped::<RequestContext>().unwrap().as_self();
/// let container = builder.build();
///
/// let request = container.begin_scope().unwrap();
/// let a = request.resolve::<Arc<RequestContext>>().unwrap();
/// let b = request.resolve::<Arc<RequestContext>>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// request.dispose();
/// assert!(request.resolve::<Arc<RequestContext>>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    // Dropped before `node`, so the lease can still reach it.
    _lease: Option<Arc<Lease>>,
    node: Arc<ScopeNode>,
}

impl Scope {
    pub(crate) fn root(shared: Arc<Shared>) -> Self {
        Self::leased(Arc::new(ScopeNode::new(shared, None)))
    }

    fn leased(node: Arc<ScopeNode>) -> Self {
        let lease = Lease {
            node: Arc::downgrade(&node),
        };
        Self {
            _lease: Some(Arc::new(lease)),
            node,
        }
    }

    /// A handle that does not keep the scope open.
    pub(crate) fn detached(&self) -> Scope {
        Scope {
            _lease: None,
            node: self.node.clone(),
        }
    }

    /// Starts a child scope.
    pub fn begin_scope(&self) -> DiResult<Scope> {
        let child = Arc::new(ScopeNode::new(self.node.shared.clone(), Some(self.clone())));
        {
            let mut bag = self.node.disposables.lock();
            if self.node.is_disposed() {
                return Err(DiError::DisposedScope(self.node.id));
            }
            bag.push_scope(Arc::downgrade(&child));
        }
        tracing::trace!(scope = child.id, parent = self.node.id, "scope started");
        Ok(Scope::leased(child))
    }

    /// Disposes this scope, its live child scopes and every disposable
    /// instance it constructed, in reverse order of construction.
    ///
    /// Idempotent and safe to call from several threads.
    pub fn dispose(&self) {
        self.node.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    /// Identifier unique within the container.
    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// Distance from the root scope.
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    pub fn parent(&self) -> Option<Scope> {
        self.node.parent.clone()
    }

    /// Handle to the container that owns this scope tree.
    pub fn container(&self) -> Container {
        Container::from_root(self.root_scope())
    }

    /// True when both handles point at the same scope node.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Number of entries that disposing this scope would release.
    pub fn pending_disposals(&self) -> usize {
        self.node.disposables.lock().len()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.node.shared
    }

    pub(crate) fn ensure_live(&self) -> DiResult<()> {
        if self.node.is_disposed() {
            return Err(DiError::DisposedScope(self.node.id));
        }
        Ok(())
    }

    /// Makes `T` constructible here even when it is not registered.
    pub(crate) fn describe<T: Component>(&self) {
        self.node
            .shared
            .describe_with(Key::of::<T>(), ComponentInfo::of::<T>);
    }

    pub(crate) fn request(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        Ok(self.resolve(key, Ownership::Scope)?.map(|resolved| resolved.value))
    }

    pub(crate) fn request_owned(&self, key: &Key) -> DiResult<Resolved> {
        self.resolve(key, Ownership::Caller)?
            .ok_or(DiError::ResolveUnregisteredInterface(key.display_name()))
    }

    pub(crate) fn request_all(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.ensure_live()?;
        let shared = &self.node.shared;
        let bindings = shared.registry.all(key);
        if bindings.is_empty() {
            // Bindings created while resolving: cached nominations and materialized templates.
            let dynamic = match shared.lookup(key) {
                Some(binding) => Some(binding),
                None => shared.materialize(key)?,
            };
            return match dynamic {
                Some(binding) => Ok(vec![self.resolve_binding(&binding, Ownership::Scope)?.value]),
                None => Ok(Vec::new()),
            };
        }
        bindings
            .iter()
            .map(|binding| self.resolve_binding(binding, Ownership::Scope).map(|r| r.value))
            .collect()
    }

    fn resolve(&self, key: &Key, ownership: Ownership) -> DiResult<Option<Resolved>> {
        self.ensure_live()?;
        let shared = &self.node.shared;

        if let Some(binding) = shared.lookup(key) {
            return self.resolve_binding(&binding, ownership).map(Some);
        }
        if let Some(value) = self.self_reference(key) {
            return Ok(Some(Resolved::shared(value)));
        }
        if let Some(binding) = shared.materialize(key)? {
            return self.resolve_binding(&binding, ownership).map(Some);
        }
        if key.is_capability() {
            return match shared.nominate(key, self)? {
                Some(binding) => self.resolve_binding(&binding, ownership).map(Some),
                None => Ok(None),
            };
        }

        // Unregistered concrete type: construct it like a transient.
        let service = key.display_name();
        let component = shared
            .catalog_entry(key)
            .ok_or_else(|| self.construction_failed(service, DiError::NotDescribed(service)))?;
        let (instance, disposer) = self.resolve_transient(&component, None, false, ownership)?;
        let value = component
            .cast(key, &instance)
            .ok_or(DiError::TypeMismatch(service))?;
        Ok(Some(Resolved { value, disposer }))
    }

    fn self_reference(&self, key: &Key) -> Option<AnyArc> {
        if *key == Key::of::<Scope>() {
            Some(Arc::new(Arc::new(self.detached())) as AnyArc)
        } else if *key == Key::of::<Container>() {
            Some(Arc::new(Arc::new(self.container().detached())) as AnyArc)
        } else {
            None
        }
    }

    fn resolve_binding(&self, binding: &Binding, ownership: Ownership) -> DiResult<Resolved> {
        let registration = &binding.registration;
        let service = binding.service.display_name();

        let (instance, disposer) = match (registration.lifetime, ownership) {
            (Lifetime::Transient, _) => self.resolve_transient(
                &registration.component,
                registration.factory.as_ref(),
                registration.external,
                ownership,
            )?,
            (_, Ownership::Caller) => return Err(DiError::OwnedScopedComponent(service)),
            (Lifetime::Scoped, Ownership::Scope) => (self.resolve_memoized(registration)?, None),
            (Lifetime::Singleton, Ownership::Scope) => {
                (self.root_scope().resolve_memoized(registration)?, None)
            }
        };

        let value = registration
            .component
            .cast(&binding.service, &instance)
            .ok_or(DiError::TypeMismatch(service))?;
        Ok(Resolved { value, disposer })
    }

    fn resolve_transient(
        &self,
        component: &ComponentInfo,
        factory: Option<&Constructor>,
        external: bool,
        ownership: Ownership,
    ) -> DiResult<(AnyArc, Option<Arc<dyn Dispose>>)> {
        let _guard = ResolutionGuard::enter(component.key().display_name())?;
        let instance = self.construct(component, factory)?;
        let disposer = if external {
            None
        } else {
            component.disposer(&instance)
        };

        match ownership {
            Ownership::Scope => {
                if let Some(disposer) = disposer {
                    self.track(disposer)?;
                }
                self.initialize(component, &instance)?;
                Ok((instance, None))
            }
            Ownership::Caller => {
                if let Err(err) = self.initialize(component, &instance) {
                    if let Some(disposer) = &disposer {
                        disposer.dispose();
                    }
                    return Err(err);
                }
                Ok((instance, disposer))
            }
        }
    }

    /// Returns this node's instance of `registration`, constructing it once.
    ///
    /// Construction is serialized per registration and node; the init hook
    /// runs after the lock is released, so hooks of two registrations may
    /// resolve each other from different threads.
    fn resolve_memoized(&self, registration: &Registration) -> DiResult<AnyArc> {
        if let Some(instance) = self.memoized(registration.id) {
            return Ok(instance);
        }

        let lock = self.construction_lock(registration.id);
        let component = &registration.component;
        let instance = {
            let _construction = lock.lock();
            if let Some(instance) = self.memoized(registration.id) {
                return Ok(instance);
            }
            self.ensure_live()?;

            let instance = {
                let _guard = ResolutionGuard::enter(component.key().display_name())?;
                self.construct(component, registration.factory.as_ref())?
            };
            if !registration.external {
                if let Some(disposer) = component.disposer(&instance) {
                    self.track(disposer)?;
                }
            }

            // Memoize before the hook so it can resolve this registration again.
            self.node
                .memo
                .lock()
                .insert(registration.id, instance.clone());
            instance
        };

        if let Err(err) = self.initialize(component, &instance) {
            let mut memo = self.node.memo.lock();
            if memo
                .get(&registration.id)
                .is_some_and(|cached| Arc::ptr_eq(cached, &instance))
            {
                memo.remove(&registration.id);
            }
            return Err(err);
        }
        Ok(instance)
    }

    fn memoized(&self, id: RegistrationId) -> Option<AnyArc> {
        self.node.memo.lock().get(&id).cloned()
    }

    fn construction_lock(&self, id: RegistrationId) -> Arc<ReentrantMutex<()>> {
        self.node
            .construction
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    fn construct(
        &self,
        component: &ComponentInfo,
        factory: Option<&Constructor>,
    ) -> DiResult<AnyArc> {
        let service = component.key().display_name();
        let instance = self.guarded(service, || match factory {
            Some(factory) => factory(self),
            None => component.construct(self),
        })?;
        tracing::trace!(service, scope = self.node.id, "constructed");
        Ok(instance)
    }

    fn initialize(&self, component: &ComponentInfo, instance: &AnyArc) -> DiResult<()> {
        self.guarded(component.key().display_name(), || {
            component.initialize(instance, self)
        })
    }

    /// Runs user code, turning errors and panics into construction failures.
    fn guarded<T>(&self, service: &'static str, f: impl FnOnce() -> DiResult<T>) -> DiResult<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(self.construction_failed(service, cause)),
            Err(payload) => {
                let cause = DiError::initializer_failed(service, panic_message(payload.as_ref()));
                Err(self.construction_failed(service, cause))
            }
        }
    }

    fn track(&self, disposer: Arc<dyn Dispose>) -> DiResult<()> {
        let mut bag = self.node.disposables.lock();
        if self.node.is_disposed() {
            drop(bag);
            disposer.dispose();
            return Err(DiError::DisposedScope(self.node.id));
        }
        bag.push_instance(disposer);
        Ok(())
    }

    /// Wraps `cause`, logging it first unless an inner construction already did.
    fn construction_failed(&self, service: &'static str, cause: DiError) -> DiError {
        if !matches!(cause, DiError::ResolveConstruction { .. }) {
            self.logger()
                .exception(&format!("Failed to construct {service}"), &cause);
        }
        DiError::construction(service, cause)
    }

    fn logger(&self) -> Arc<dyn Logger> {
        self.root_scope()
            .request(&Key::of::<dyn Logger>())
            .ok()
            .flatten()
            .and_then(|any| downcast_service::<dyn Logger>(any).ok())
            .unwrap_or_else(|| Arc::new(TracingLogger))
    }

    fn root_scope(&self) -> Scope {
        let mut scope = self;
        while let Some(parent) = &scope.node.parent {
            scope = parent;
        }
        scope.clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "initializer panicked".to_string()
    }
}

impl ResolverCore for Scope {
    fn as_scope(&self) -> &Scope {
        self
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.node.id)
            .field("depth", &self.node.depth)
            .field("disposed", &self.node.is_disposed())
            .finish()
    }
}
