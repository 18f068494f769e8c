//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::{Resolved, Scope};
use crate::registration::AnyArc;
use crate::resolvable::{downcast_service, Resolvable};
use crate::wrappers::Owned;

/// Core resolver trait for object-safe service resolution.
///
/// Values cross this boundary type-erased: a service `S` travels as an
/// `Arc<Arc<S>>` behind `Arc<dyn Any + Send + Sync>`. Most users should use
/// the [`Resolver`] trait instead, which provides the typed methods built on
/// top of this one.
pub trait ResolverCore: Send + Sync {
    /// The scope this resolver resolves in.
    fn as_scope(&self) -> &Scope;

    /// Resolves `key`, failing with `ResolveUnregisteredInterface` when a
    /// capability has no registration and no fallback.
    fn resolve_key(&self, key: &Key) -> DiResult<AnyArc> {
        self.get_service(key)?
            .ok_or(DiError::ResolveUnregisteredInterface(key.display_name()))
    }

    /// Provider-style lookup: absent instead of `ResolveUnregisteredInterface`.
    fn get_service(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        self.as_scope().request(key)
    }

    /// Every binding of `key`, in registration order.
    fn resolve_all_keys(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.as_scope().request_all(key)
    }

    /// Resolves `key` with disposal responsibility handed to the caller.
    fn resolve_owned_key(&self, key: &Key) -> DiResult<Resolved> {
        self.as_scope().request_owned(key)
    }
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// Both [`Container`](crate::Container) and [`Scope`] implement this trait.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, Lazy, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// #[derive(Default)]
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
/// impl Component for FixedClock {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().implements::<dyn Clock>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<FixedClock>().unwrap().as_service::<dyn Clock>().unwrap();
/// let container = builder.build();
///
/// let clock = container.resolve::<Arc<dyn Clock>>().unwrap();
/// assert_eq!(clock.now(), 42);
///
/// let lazy = container.resolve::<Lazy<Arc<dyn Clock>>>().unwrap();
/// assert!(!lazy.is_value_created());
/// assert_eq!(lazy.get().unwrap().now(), 42);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves any [`Resolvable`] form: `Arc<T>`, `Vec<Arc<T>>`, `Lazy<_>`,
    /// `Supplier<_>`, `Owned<T>`, `Scope` or `Container`.
    fn resolve<R: Resolvable>(&self) -> DiResult<R> {
        R::resolve_in(self.as_scope())
    }

    /// Like [`resolve`](Self::resolve) but absent when nothing can satisfy the request.
    fn try_resolve<R: Resolvable>(&self) -> DiResult<Option<R>> {
        R::try_resolve_in(self.as_scope())
    }

    /// Resolves `T` through the provider lookup, failing with
    /// `ResolveUnregisteredService` when the provider yields nothing.
    fn resolve_required<T>(&self) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.get_service(&Key::of::<T>())? {
            Some(any) => downcast_service::<T>(any),
            None => Err(DiError::ResolveUnregisteredService(std::any::type_name::<T>())),
        }
    }

    /// Every registered implementation of `T`, in registration order.
    fn resolve_all<T>(&self) -> DiResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<Vec<Arc<T>>>()
    }

    /// Resolves a transient `T` whose disposal the caller takes over.
    fn resolve_owned<T>(&self) -> DiResult<Owned<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<Owned<T>>()
    }

    /// Resolves `T`, constructing it from its descriptor when it is not registered.
    fn resolve_component<T: crate::Component>(&self) -> DiResult<Arc<T>> {
        self.as_scope().describe::<T>();
        self.resolve::<Arc<T>>()
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
