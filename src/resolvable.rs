//! Types a scope can hand out.
//!
//! Besides plain services (`Arc<T>`), a scope resolves a few special forms:
//! itself (`Scope`), its container (`Container`), every implementation of a
//! service (`Vec<Arc<T>>`), deferred and lazy access
//! ([`Supplier`](crate::Supplier), [`Lazy`](crate::Lazy)) and caller-owned
//! transients ([`Owned`](crate::Owned)). Each form, including user-defined
//! ones, implements [`Resolvable`]; initializer parameters are resolved the
//! same way.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::{Container, Scope};
use crate::registration::AnyArc;

/// A value that can be resolved from a [`Scope`].
///
/// Implement this trait to add a wrapper form of your own. Wrappers that hand
/// disposal responsibility to their holder must obtain the instance through
/// [`ResolverCore::resolve_owned_key`](crate::ResolverCore::resolve_owned_key)
/// so the scope does not dispose it as well.
pub trait Resolvable: Sized + Send + Sync + 'static {
    fn resolve_in(scope: &Scope) -> DiResult<Self>;

    /// Absent when nothing is registered for a capability and no fallback applies.
    fn try_resolve_in(scope: &Scope) -> DiResult<Option<Self>> {
        Self::resolve_in(scope).map(Some)
    }
}

/// Unwraps the erased `Arc<Arc<T>>` a scope hands out.
pub(crate) fn downcast_service<T>(any: AnyArc) -> DiResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    any.downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

impl<T> Resolvable for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        let key = Key::of::<T>();
        match scope.request(&key)? {
            Some(any) => downcast_service::<T>(any),
            None => Err(DiError::ResolveUnregisteredInterface(key.display_name())),
        }
    }

    fn try_resolve_in(scope: &Scope) -> DiResult<Option<Self>> {
        scope
            .request(&Key::of::<T>())?
            .map(downcast_service::<T>)
            .transpose()
    }
}

impl<T> Resolvable for Vec<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        scope
            .request_all(&Key::of::<T>())?
            .into_iter()
            .map(downcast_service::<T>)
            .collect()
    }
}

// Injected handles never keep their scope open.
impl Resolvable for Scope {
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        scope.ensure_live()?;
        Ok(scope.detached())
    }
}

impl Resolvable for Container {
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        scope.ensure_live()?;
        Ok(scope.container().detached())
    }
}
