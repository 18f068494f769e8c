//! Service registration types.

use std::any::Any;
use std::panic::Location;
use std::sync::Arc;

use crate::descriptor::{ComponentInfo, Constructor};
use crate::key::Key;
use crate::lifetime::Lifetime;

/// Type-erased shared value; services cross the resolver boundary as `Arc<Arc<S>>` inside it.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

#[cfg(feature = "ahash")]
pub(crate) type Map<K, V> = ahash::AHashMap<K, V>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

/// Identity of a registration; memo tables are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistrationId(pub(crate) usize);

/// One implementing type under one lifetime, shared by all its bindings.
pub(crate) struct Registration {
    pub(crate) id: RegistrationId,
    pub(crate) component: ComponentInfo,
    pub(crate) lifetime: Lifetime,
    /// Replaces initializer selection when present
    pub(crate) factory: Option<Constructor>,
    /// Pre-built instances are never disposed by the container
    pub(crate) external: bool,
}

impl Registration {
    pub(crate) fn new(
        id: RegistrationId,
        component: ComponentInfo,
        lifetime: Lifetime,
        factory: Option<Constructor>,
        external: bool,
    ) -> Self {
        Self {
            id,
            component,
            lifetime,
            factory,
            external,
        }
    }
}

/// A registration exposed under one service key.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) service: Key,
    pub(crate) registration: Arc<Registration>,
    pub(crate) registered_at: Option<&'static Location<'static>>,
}

/// Frozen service registry.
pub(crate) struct Registry {
    /// Last binding wins for single resolution
    one: Map<Key, Binding>,
    /// Every binding per key, in registration order (append-only)
    many: Map<Key, Vec<Binding>>,
    /// Every binding in registration order, for introspection
    order: Vec<Binding>,
    registrations: usize,
}

impl Registry {
    pub(crate) fn new(registrations: usize) -> Self {
        Self {
            one: Map::default(),
            many: Map::default(),
            order: Vec::new(),
            registrations,
        }
    }

    pub(crate) fn bind(&mut self, binding: Binding) {
        self.one.insert(binding.service, binding.clone());
        self.many.entry(binding.service).or_default().push(binding.clone());
        self.order.push(binding);
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<&Binding> {
        self.one.get(key)
    }

    pub(crate) fn all(&self, key: &Key) -> &[Binding] {
        self.many.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn bindings(&self) -> &[Binding] {
        &self.order
    }

    /// Number of static registrations; dynamic ids start here.
    pub(crate) fn registration_count(&self) -> usize {
        self.registrations
    }
}
