//! Deferred, lazy and owned resolution.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::DiResult;
use crate::key::Key;
use crate::provider::Scope;
use crate::resolvable::{downcast_service, Resolvable};
use crate::traits::{Dispose, ResolverCore};

/// Resolves `R` from the originating scope each time it is called.
///
/// Nothing is resolved when the supplier itself is injected, which makes it
/// the way to depend on something that is expensive or not always needed.
/// A supplier does not keep its scope open; once the scope is disposed,
/// [`get`](Supplier::get) fails with `DisposedScope`.
pub struct Supplier<R> {
    scope: Scope,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resolvable> Supplier<R> {
    /// Resolves a value now. Transient services yield a new instance per call.
    pub fn get(&self) -> DiResult<R> {
        R::resolve_in(&self.scope)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl<R> Clone for Supplier<R> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Resolvable> Resolvable for Supplier<R> {
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        scope.ensure_live()?;
        Ok(Self {
            scope: scope.detached(),
            _marker: PhantomData,
        })
    }
}

impl<R> fmt::Debug for Supplier<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supplier")
            .field("target", &std::any::type_name::<R>())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Resolves `R` on first access and caches the value.
///
/// A failed first access is not cached; the next access tries again.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, Lazy, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Expensive;
/// impl Component for Expensive {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default()
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<Expensive>().unwrap().as_self();
/// let container = builder.build();
///
/// let lazy = container.resolve::<Lazy<Arc<Expensive>>>().unwrap();
/// assert!(!lazy.is_value_created());
/// let first = lazy.get().unwrap().clone();
/// assert!(Arc::ptr_eq(&first, lazy.get().unwrap()));
/// ```
pub struct Lazy<R> {
    supplier: Supplier<R>,
    cell: OnceCell<R>,
}

impl<R: Resolvable> Lazy<R> {
    pub fn get(&self) -> DiResult<&R> {
        self.cell.get_or_try_init(|| self.supplier.get())
    }

    pub fn is_value_created(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<R: Resolvable> Resolvable for Lazy<R> {
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        Ok(Self {
            supplier: Supplier::resolve_in(scope)?,
            cell: OnceCell::new(),
        })
    }
}

impl<R> fmt::Debug for Lazy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("target", &std::any::type_name::<R>())
            .field("created", &self.cell.get().is_some())
            .finish()
    }
}

/// A transient instance whose disposal the holder is responsible for.
///
/// The scope that constructed the instance does not track it. Only the
/// top-level instance changes hands; its own dependencies stay with the
/// scope. Requesting an owned scoped or singleton service fails with
/// [`DiError::OwnedScopedComponent`](crate::DiError::OwnedScopedComponent).
///
/// Dropping an `Owned` without calling [`dispose`](Owned::dispose) does not
/// dispose the instance.
pub struct Owned<T: ?Sized> {
    value: Arc<T>,
    disposer: Mutex<Option<Arc<dyn Dispose>>>,
}

impl<T: ?Sized> Owned<T> {
    /// Disposes the instance if it is disposable; later calls do nothing.
    pub fn dispose(&self) {
        let disposer = self.disposer.lock().take();
        if let Some(disposer) = disposer {
            disposer.dispose();
        }
    }

    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Gives up ownership without disposing.
    pub fn into_inner(self) -> Arc<T> {
        self.value
    }
}

impl<T: ?Sized> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Resolvable for Owned<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        let (value, disposer) = scope.resolve_owned_key(&Key::of::<T>())?.into_parts();
        Ok(Self {
            value: downcast_service::<T>(value)?,
            disposer: Mutex::new(disposer),
        })
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dispose for Owned<T> {
    fn dispose(&self) {
        Owned::dispose(self);
    }
}

impl<T: ?Sized> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("target", &std::any::type_name::<T>())
            .field("disposable", &self.disposer.lock().is_some())
            .finish()
    }
}
