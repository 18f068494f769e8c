//! Process-wide ambient container.
//!
//! Code that cannot receive a scope by injection can reach an application's
//! container here. The ambient slot is explicitly initialized and torn down
//! by the application; nothing in the library populates it.
//!
//! ```
//! use lifescope::{ambient, ContainerBuilder};
//!
//! let previous = ambient::init(ContainerBuilder::new().build());
//! assert!(previous.is_none());
//! assert!(ambient::current().is_some());
//!
//! ambient::teardown();
//! assert!(ambient::current().is_none());
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::provider::Container;
use crate::resolvable::Resolvable;

static AMBIENT: Lazy<RwLock<Option<Container>>> = Lazy::new(|| RwLock::new(None));

/// Installs `container` as the ambient container, returning the one it replaces.
///
/// The replaced container is handed back undisposed.
pub fn init(container: Container) -> Option<Container> {
    tracing::debug!(root = container.id(), "ambient container installed");
    AMBIENT.write().replace(container)
}

pub fn current() -> Option<Container> {
    AMBIENT.read().clone()
}

/// Removes the ambient container and disposes it.
pub fn teardown() {
    let container = AMBIENT.write().take();
    if let Some(container) = container {
        tracing::debug!(root = container.id(), "ambient container torn down");
        container.dispose();
    }
}

/// Resolves `R` from the ambient container's root scope.
pub fn resolve<R: Resolvable>() -> DiResult<R> {
    let container = current().ok_or(DiError::AmbientNotInitialized)?;
    R::resolve_in(container.root())
}
