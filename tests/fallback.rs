use lifescope::{
    Component, ContainerBuilder, DiError, Key, Lifetime, Nomination, Resolver, TypeDescriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Storage: Send + Sync {
    fn backend(&self) -> &'static str;
}

trait Cache: Send + Sync {}

#[derive(Default)]
struct MemoryStorage;

impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl Component for MemoryStorage {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Storage>(|it| it)
    }
}

#[derive(Default)]
struct DiskStorage;

impl Storage for DiskStorage {
    fn backend(&self) -> &'static str {
        "disk"
    }
}

impl Component for DiskStorage {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Storage>(|it| it)
    }
}

fn wants_storage(key: &Key) -> bool {
    *key == Key::of::<dyn Storage>()
}

#[test]
fn test_first_nominating_resolver_wins() {
    let mut builder = ContainerBuilder::new();
    builder
        .fallback_resolver(|_| None)
        .fallback_resolver(|context| {
            wants_storage(context.requested()).then(Nomination::of::<DiskStorage>)
        })
        .fallback_resolver(|context| {
            wants_storage(context.requested()).then(Nomination::of::<MemoryStorage>)
        });
    let container = builder.build();

    let storage = container.resolve::<Arc<dyn Storage>>().unwrap();
    assert_eq!(storage.backend(), "disk");
}

#[test]
fn test_registration_takes_precedence_over_fallback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register::<MemoryStorage>()
        .unwrap()
        .as_service::<dyn Storage>()
        .unwrap();
    builder.fallback_resolver(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Some(Nomination::of::<DiskStorage>())
    });
    let container = builder.build();

    assert_eq!(container.resolve::<Arc<dyn Storage>>().unwrap().backend(), "memory");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_uncached_nomination_is_asked_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(move |context| {
        if !wants_storage(context.requested()) {
            return None;
        }
        seen.fetch_add(1, Ordering::SeqCst);
        Some(Nomination::of::<MemoryStorage>())
    });
    let container = builder.build();

    let a = container.resolve::<Arc<dyn Storage>>().unwrap();
    let b = container.resolve::<Arc<dyn Storage>>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cached_nomination_becomes_a_registration() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(move |context| {
        if !wants_storage(context.requested()) {
            return None;
        }
        seen.fetch_add(1, Ordering::SeqCst);
        Some(Nomination::of::<MemoryStorage>().cached(Lifetime::Singleton))
    });
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let a = container.resolve::<Arc<dyn Storage>>().unwrap();
    let b = scope.resolve::<Arc<dyn Storage>>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let descriptor = container
        .descriptors()
        .into_iter()
        .find(|d| d.key == Key::of::<dyn Storage>())
        .unwrap();
    assert_eq!(descriptor.lifetime, Lifetime::Singleton);
    assert!(descriptor.registered_at.is_none());
}

#[test]
fn test_cached_nomination_joins_the_sequence() {
    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(|context| {
        wants_storage(context.requested())
            .then(|| Nomination::of::<MemoryStorage>().cached(Lifetime::Singleton))
    });
    let container = builder.build();

    // Sequences list bindings; the fallback has not been asked yet.
    assert!(container.resolve_all::<dyn Storage>().unwrap().is_empty());

    let single = container.resolve::<Arc<dyn Storage>>().unwrap();
    let all = container.resolve_all::<dyn Storage>().unwrap();
    assert_eq!(all.len(), 1);
    assert!(Arc::ptr_eq(&single, &all[0]));

    let scope = container.begin_scope().unwrap();
    let from_scope = scope.resolve::<Vec<Arc<dyn Storage>>>().unwrap();
    assert_eq!(from_scope.len(), 1);
    assert!(Arc::ptr_eq(&single, &from_scope[0]));
}

#[test]
fn test_nomination_must_satisfy_the_capability() {
    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(|context| {
        (*context.requested() == Key::of::<dyn Cache>()).then(Nomination::of::<MemoryStorage>)
    });
    let container = builder.build();

    match container.resolve::<Arc<dyn Cache>>() {
        Err(DiError::IncompatibleType {
            implementation,
            service,
        }) => {
            assert!(implementation.contains("MemoryStorage"));
            assert!(service.contains("Cache"));
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_fallbacks_are_not_consulted_for_concrete_types() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        None
    });
    let container = builder.build();

    container.resolve_component::<MemoryStorage>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_default_implementation_is_consulted_after_resolvers() {
    let mut builder = ContainerBuilder::new();
    builder
        .default_implementation::<dyn Storage, MemoryStorage>(Lifetime::Transient)
        .unwrap();
    builder.fallback_resolver(|context| {
        wants_storage(context.requested()).then(Nomination::of::<DiskStorage>)
    });
    let container = builder.build();
    assert_eq!(container.resolve::<Arc<dyn Storage>>().unwrap().backend(), "disk");

    let mut builder = ContainerBuilder::new();
    builder
        .default_implementation::<dyn Storage, MemoryStorage>(Lifetime::Transient)
        .unwrap();
    let container = builder.build();
    assert_eq!(container.resolve::<Arc<dyn Storage>>().unwrap().backend(), "memory");
}

#[test]
fn test_scoped_default_implementation_is_per_scope() {
    let mut builder = ContainerBuilder::new();
    builder
        .default_implementation::<dyn Storage, DiskStorage>(Lifetime::Scoped)
        .unwrap();
    let container = builder.build();

    let first = container.begin_scope().unwrap();
    let second = container.begin_scope().unwrap();
    let a = first.resolve::<Arc<dyn Storage>>().unwrap();
    let b = first.resolve::<Arc<dyn Storage>>().unwrap();
    let c = second.resolve::<Arc<dyn Storage>>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_incompatible_default_implementation_is_rejected() {
    let mut builder = ContainerBuilder::new();
    let result = builder.default_implementation::<dyn Cache, DiskStorage>(Lifetime::Singleton);
    assert!(matches!(result, Err(DiError::IncompatibleType { .. })));
}

#[test]
fn test_unnominated_capability_is_absent() {
    let mut builder = ContainerBuilder::new();
    builder.fallback_resolver(|context| {
        wants_storage(context.requested()).then(Nomination::of::<DiskStorage>)
    });
    let container = builder.build();

    assert!(container.try_resolve::<Arc<dyn Cache>>().unwrap().is_none());
    assert!(container.resolve::<Vec<Arc<dyn Cache>>>().unwrap().is_empty());
}
