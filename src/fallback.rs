//! Custom fallback resolution for unregistered capabilities.
//!
//! When a capability has no registration, the container consults its
//! fallback resolvers in the order they were added, then the table of
//! default implementations. The first resolver that nominates an
//! implementing type wins; the nomination must satisfy the requested
//! capability or resolution fails with `IncompatibleType`.

use crate::descriptor::{Component, ComponentInfo};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::Scope;
use crate::registration::Map;

/// What a fallback resolver is asked about.
pub struct FallbackContext<'a> {
    requested: Key,
    scope: &'a Scope,
}

impl<'a> FallbackContext<'a> {
    pub(crate) fn new(requested: Key, scope: &'a Scope) -> Self {
        Self { requested, scope }
    }

    /// The capability being resolved.
    pub fn requested(&self) -> &Key {
        &self.requested
    }

    /// The scope the request was made in.
    pub fn scope(&self) -> &Scope {
        self.scope
    }
}

/// An implementing type nominated for an unregistered capability.
///
/// By default the nomination is not cached: the resolver is asked again on
/// every request and each request constructs a fresh instance. A cached
/// nomination becomes a registration with the given lifetime and the
/// resolver is not consulted again for that capability.
#[derive(Clone, Debug)]
pub struct Nomination {
    pub(crate) component: ComponentInfo,
    pub(crate) lifetime: Lifetime,
    pub(crate) cacheable: bool,
}

impl Nomination {
    pub fn of<T: Component>() -> Self {
        Self::component(ComponentInfo::of::<T>())
    }

    pub fn component(component: ComponentInfo) -> Self {
        Self {
            component,
            lifetime: Lifetime::Transient,
            cacheable: false,
        }
    }

    /// Caches the decision as a registration with `lifetime`.
    pub fn cached(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self.cacheable = true;
        self
    }
}

/// Nominates implementations for capabilities that have no registration.
///
/// Closures of the shape `Fn(&FallbackContext) -> Option<Nomination>` implement this trait.
///
/// # Examples
///
/// ```rust
/// use lifescope::{
///     Component, ContainerBuilder, Key, Nomination, Resolver, TypeDescriptor,
/// };
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {}
///
/// #[derive(Default)]
/// struct SystemClock;
/// impl Clock for SystemClock {}
/// impl Component for SystemClock {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().implements::<dyn Clock>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.fallback_resolver(|context| {
///     (*context.requested() == Key::of::<dyn Clock>()).then(Nomination::of::<SystemClock>)
/// });
/// let container = builder.build();
/// assert!(container.resolve::<Arc<dyn Clock>>().is_ok());
/// ```
pub trait FallbackResolver: Send + Sync {
    fn resolve(&self, context: &FallbackContext<'_>) -> Option<Nomination>;
}

impl<F> FallbackResolver for F
where
    F: Fn(&FallbackContext<'_>) -> Option<Nomination> + Send + Sync,
{
    fn resolve(&self, context: &FallbackContext<'_>) -> Option<Nomination> {
        self(context)
    }
}

/// Default implementations declared on capabilities, consulted after the
/// custom fallback resolvers.
#[derive(Default)]
pub(crate) struct DefaultImplementations {
    entries: Map<Key, Nomination>,
}

impl DefaultImplementations {
    pub(crate) fn insert(&mut self, service: Key, nomination: Nomination) {
        self.entries.insert(service, nomination);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FallbackResolver for DefaultImplementations {
    fn resolve(&self, context: &FallbackContext<'_>) -> Option<Nomination> {
        self.entries.get(context.requested()).cloned()
    }
}
