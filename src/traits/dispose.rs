//! Lifecycle traits: disposal and post-construction initialization.

use crate::error::DiResult;
use crate::provider::Scope;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections) and declare it with
/// [`TypeDescriptor::disposable`](crate::TypeDescriptor::disposable). The scope that
/// constructed an instance disposes it, in reverse construction order, when the scope itself
/// is disposed.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, Dispose, Resolver, TypeDescriptor};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// impl Component for Cache {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().disposable()
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_scoped::<Cache>().unwrap().as_self();
/// let container = builder.build();
///
/// let scope = container.begin_scope().unwrap();
/// let cache = scope.resolve::<Arc<Cache>>().unwrap();
/// scope.dispose();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Post-construction hook, run once per constructed instance.
///
/// Memoized instances are stored before the hook runs, so the hook may resolve
/// services that depend on the instance being initialized.
pub trait Initialize: Send + Sync + 'static {
    fn initialize(&self, scope: &Scope) -> DiResult<()>;
}
