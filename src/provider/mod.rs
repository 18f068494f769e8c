//! Containers and the state shared by every scope of one container.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::ComponentInfo;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::fallback::{DefaultImplementations, FallbackContext, FallbackResolver};
use crate::generic::OpenGeneric;
use crate::key::Key;
use crate::registration::{AnyArc, Binding, Map, Registration, RegistrationId, Registry};
use crate::traits::{Dispose, ResolverCore};

mod scope;

pub use scope::Scope;
pub(crate) use scope::ScopeNode;

/// A resolved value together with the disposal duty handed to the caller.
///
/// Only owned resolution hands out a disposer; everywhere else the scope
/// that constructed the instance keeps it.
pub struct Resolved {
    pub(crate) value: AnyArc,
    pub(crate) disposer: Option<Arc<dyn Dispose>>,
}

impl Resolved {
    pub(crate) fn shared(value: AnyArc) -> Self {
        Self {
            value,
            disposer: None,
        }
    }

    /// The type-erased `Arc<Arc<S>>` of the requested service.
    pub fn value(&self) -> &AnyArc {
        &self.value
    }

    pub fn into_parts(self) -> (AnyArc, Option<Arc<dyn Dispose>>) {
        (self.value, self.disposer)
    }
}

/// Who disposes a transient instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ownership {
    Scope,
    Caller,
}

/// Registry and resolution policy shared by a container and all its scopes.
pub(crate) struct Shared {
    pub(crate) registry: Registry,
    fallbacks: Vec<Arc<dyn FallbackResolver>>,
    defaults: DefaultImplementations,
    generics: Vec<OpenGeneric>,
    /// Descriptors of types that may be constructed without a registration
    catalog: RwLock<Map<Key, ComponentInfo>>,
    /// Bindings created while resolving: materialized templates and cached nominations
    dynamic: RwLock<Map<Key, Binding>>,
    next_registration: AtomicUsize,
    next_scope: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        registry: Registry,
        fallbacks: Vec<Arc<dyn FallbackResolver>>,
        defaults: DefaultImplementations,
        generics: Vec<OpenGeneric>,
        catalog: Map<Key, ComponentInfo>,
    ) -> Self {
        let next_registration = AtomicUsize::new(registry.registration_count());
        Self {
            registry,
            fallbacks,
            defaults,
            generics,
            catalog: RwLock::new(catalog),
            dynamic: RwLock::new(Map::default()),
            next_registration,
            next_scope: AtomicU64::new(0),
        }
    }

    pub(crate) fn lookup(&self, key: &Key) -> Option<Binding> {
        if let Some(binding) = self.registry.get(key) {
            return Some(binding.clone());
        }
        self.dynamic.read().get(key).cloned()
    }

    /// Closes the first open generic template whose shape matches `key`.
    pub(crate) fn materialize(&self, key: &Key) -> DiResult<Option<Binding>> {
        for template in self.generics.iter().filter(|t| t.matches(key)) {
            let Some(component) = template.close_for(key) else {
                continue;
            };
            if !component.satisfies(key) {
                return Err(DiError::IncompatibleType {
                    implementation: component.key().display_name(),
                    service: key.display_name(),
                });
            }
            tracing::debug!(
                service = key.display_name(),
                implementation = component.key().display_name(),
                template = %template.shape(),
                "materialized open generic"
            );
            let binding = self.dynamic_binding(*key, component, template.lifetime());
            return Ok(Some(self.cache(binding)));
        }
        Ok(None)
    }

    /// Asks the fallback resolvers, then the default implementations.
    pub(crate) fn nominate(&self, key: &Key, scope: &Scope) -> DiResult<Option<Binding>> {
        let context = FallbackContext::new(*key, scope);
        let nomination = self
            .fallbacks
            .iter()
            .find_map(|resolver| resolver.resolve(&context))
            .or_else(|| self.defaults.resolve(&context));
        let Some(nomination) = nomination else {
            return Ok(None);
        };

        if !nomination.component.satisfies(key) {
            return Err(DiError::IncompatibleType {
                implementation: nomination.component.key().display_name(),
                service: key.display_name(),
            });
        }

        tracing::debug!(
            service = key.display_name(),
            implementation = nomination.component.key().display_name(),
            cached = nomination.cacheable,
            "fallback nominated implementation"
        );
        let binding = self.dynamic_binding(*key, nomination.component, nomination.lifetime);
        if nomination.cacheable {
            Ok(Some(self.cache(binding)))
        } else {
            Ok(Some(binding))
        }
    }

    pub(crate) fn catalog_entry(&self, key: &Key) -> Option<ComponentInfo> {
        self.catalog.read().get(key).cloned()
    }

    pub(crate) fn describe_with(&self, key: Key, describe: impl FnOnce() -> ComponentInfo) {
        if self.catalog.read().contains_key(&key) {
            return;
        }
        let mut catalog = self.catalog.write();
        let component = catalog.entry(key).or_insert_with(describe).clone();
        component.seed_dependencies(&mut catalog);
    }

    /// Makes the dependencies of a component created while resolving constructible.
    fn seed(&self, component: &ComponentInfo) {
        if component
            .dependencies()
            .all(|key| self.catalog.read().contains_key(&key))
        {
            return;
        }
        component.seed_dependencies(&mut self.catalog.write());
    }

    pub(crate) fn next_scope_id(&self) -> u64 {
        self.next_scope.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn descriptors(&self) -> Vec<ServiceDescriptor> {
        let mut descriptors: Vec<ServiceDescriptor> = self
            .registry
            .bindings()
            .iter()
            .map(ServiceDescriptor::from_binding)
            .collect();
        descriptors.extend(self.dynamic.read().values().map(ServiceDescriptor::from_binding));
        descriptors
    }

    fn dynamic_binding(
        &self,
        service: Key,
        component: ComponentInfo,
        lifetime: crate::Lifetime,
    ) -> Binding {
        self.seed(&component);
        let id = RegistrationId(self.next_registration.fetch_add(1, Ordering::Relaxed));
        Binding {
            service,
            registration: Arc::new(Registration::new(id, component, lifetime, None, false)),
            registered_at: None,
        }
    }

    // First writer wins so concurrent materializations share one registration.
    fn cache(&self, binding: Binding) -> Binding {
        self.dynamic
            .write()
            .entry(binding.service)
            .or_insert(binding)
            .clone()
    }
}

/// The root of a scope tree, produced by [`ContainerBuilder::build`](crate::ContainerBuilder::build).
///
/// A container is a cheap, cloneable handle to its root scope; it derefs to
/// [`Scope`] for `begin_scope`, `dispose` and introspection. Singletons live
/// in the root scope and are disposed when the container is disposed or
/// when the last handle to the root is dropped.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, Container, ContainerBuilder, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database;
/// impl Component for Database {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default()
///     }
/// }
///
/// struct UserService { db: Arc<Database> }
/// impl Component for UserService {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().initializer(|db: Arc<Database>| UserService { db })
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<Database>().unwrap().as_self();
/// builder.register_scoped::<UserService>().unwrap().as_self();
/// let container = builder.build();
///
/// let scope = container.begin_scope().unwrap();
/// let service = scope.resolve::<Arc<UserService>>().unwrap();
/// assert!(Arc::ptr_eq(&service.db, &container.resolve::<Arc<Database>>().unwrap()));
///
/// // The container resolves to itself.
/// let same = scope.resolve::<Container>().unwrap();
/// assert_eq!(same.id(), container.id());
/// ```
#[derive(Clone)]
pub struct Container {
    root: Scope,
}

impl Container {
    pub(crate) fn new(shared: Shared) -> Self {
        Self {
            root: Scope::root(Arc::new(shared)),
        }
    }

    pub(crate) fn from_root(root: Scope) -> Self {
        Self { root }
    }

    /// A handle that does not keep the container open.
    pub(crate) fn detached(&self) -> Self {
        Self {
            root: self.root.detached(),
        }
    }

    /// The root scope.
    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// Bindings of the frozen registry plus those created while resolving.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.root.shared().descriptors()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        s.push_str("=== Container Debug ===\n");
        s.push_str("Bindings:\n");
        for descriptor in self.descriptors() {
            let _ = writeln!(
                s,
                "  {:?} -> {} ({})",
                descriptor.key,
                descriptor.implementation_name(),
                descriptor.lifetime
            );
        }
        let _ = writeln!(s, "Root scope: {:?}", self.root);
        s
    }
}

impl Deref for Container {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.root
    }
}

impl ResolverCore for Container {
    fn as_scope(&self) -> &Scope {
        &self.root
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("root", &self.root)
            .field("bindings", &self.root.shared().registry.bindings().len())
            .finish()
    }
}
