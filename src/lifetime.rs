//! Registration lifetime definitions.

use std::fmt;

/// Instance scope of a registration, controlling memoization and disposal ownership
///
/// # Examples
///
/// ```rust
/// use lifescope::{Component, ContainerBuilder, Resolver, TypeDescriptor};
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
/// #[derive(Default)]
/// struct Repository;
/// impl Component for Repository {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default()
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<Database>().unwrap().as_self();
/// builder.register_scoped::<Repository>().unwrap().as_self();
/// let container = builder.build();
///
/// let scope1 = container.begin_scope().unwrap();
/// let scope2 = container.begin_scope().unwrap();
///
/// // Singleton: same instance across scopes
/// let db1 = scope1.resolve::<Arc<Database>>().unwrap();
/// let db2 = scope2.resolve::<Arc<Database>>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within a scope, different across scopes
/// let repo1a = scope1.resolve::<Arc<Repository>>().unwrap();
/// let repo1b = scope1.resolve::<Arc<Repository>>().unwrap();
/// let repo2 = scope2.resolve::<Arc<Repository>>().unwrap();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root container, materialized in the root node
    ///
    /// Resolving from any descendant scope delegates to the root, so every
    /// caller observes the same instance. Disposed with the container.
    Singleton,
    /// Single instance per scope node
    ///
    /// Memoized in the node where it was first requested. Sibling and
    /// parent/child scopes each get their own instance. Disposed with the node.
    Scoped,
    /// New instance per resolution, never memoized
    ///
    /// Disposed with the node that constructed it, unless the caller took
    /// ownership through [`Owned`](crate::Owned).
    Transient,
}

impl Lifetime {
    /// Whether instances of this lifetime live in a memoization table.
    pub fn is_memoized(self) -> bool {
        !matches!(self, Lifetime::Transient)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
