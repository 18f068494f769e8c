//! Service descriptors for introspection and diagnostics.

use std::panic::Location;

use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::Binding;

/// Service descriptor for introspection and diagnostics
///
/// One descriptor per binding: the service key a caller requests, the
/// implementing type that satisfies it, and the registration's lifetime.
///
/// # Examples
///
/// ```rust
/// use lifescope::{Component, ContainerBuilder, Lifetime, TypeDescriptor};
///
/// trait Logger: Send + Sync {}
///
/// #[derive(Default)]
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
/// impl Component for ConsoleLogger {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().implements::<dyn Logger>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register_singleton::<ConsoleLogger>()
///     .unwrap()
///     .as_service::<dyn Logger>()
///     .unwrap()
///     .as_self();
///
/// let descriptors = builder.descriptors();
/// assert_eq!(descriptors.len(), 2);
/// assert!(descriptors.iter().all(|d| d.lifetime == Lifetime::Singleton));
///
/// let logger = descriptors.iter().find(|d| d.type_name().contains("Logger")).unwrap();
/// assert!(logger.implementation_name().contains("ConsoleLogger"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key callers request
    pub key: Key,
    /// Key of the implementing type
    pub implementation: Key,
    /// Registration lifetime
    pub lifetime: Lifetime,
    /// Where the binding was registered; absent for bindings created while resolving
    pub registered_at: Option<&'static Location<'static>>,
}

impl ServiceDescriptor {
    pub(crate) fn from_binding(binding: &Binding) -> Self {
        Self {
            key: binding.service,
            implementation: binding.registration.component.key(),
            lifetime: binding.registration.lifetime,
            registered_at: binding.registered_at,
        }
    }

    /// Get the type/trait name
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn implementation_name(&self) -> &'static str {
        self.implementation.display_name()
    }

    /// True when the service is bound to its own implementing type.
    pub fn is_self_binding(&self) -> bool {
        self.key == self.implementation
    }
}
