use lifescope::{
    Component, ContainerBuilder, DiError, DiResult, Dispose, Initialize, Key, Lazy, Owned,
    Resolvable, Resolver, ResolverCore, Scope, Supplier, TypeDescriptor,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

macro_rules! plugin {
    ($name:ident) => {
        #[derive(Default)]
        struct $name;
        impl Plugin for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }
        }
        impl Component for $name {
            fn describe() -> TypeDescriptor<Self> {
                TypeDescriptor::new()
                    .with_default()
                    .implements::<dyn Plugin>(|it| it)
            }
        }
    };
}

plugin!(Alpha);
plugin!(Beta);
plugin!(Gamma);

#[test]
fn test_sequence_returns_every_binding_in_registration_order() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Alpha>().unwrap().as_service::<dyn Plugin>().unwrap();
    builder.register_singleton::<Beta>().unwrap().as_service::<dyn Plugin>().unwrap();
    builder.register_scoped::<Gamma>().unwrap().as_service::<dyn Plugin>().unwrap();
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let plugins = scope.resolve::<Vec<Arc<dyn Plugin>>>().unwrap();
    let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

    // Single resolution picks the last binding.
    assert_eq!(scope.resolve::<Arc<dyn Plugin>>().unwrap().name(), "Gamma");
    assert_eq!(scope.resolve_all::<dyn Plugin>().unwrap().len(), 3);
}

#[test]
fn test_sequence_of_unregistered_service_is_empty() {
    let container = ContainerBuilder::new().build();
    assert!(container.resolve::<Vec<Arc<dyn Plugin>>>().unwrap().is_empty());
}

struct Counted;

static COUNTED: AtomicUsize = AtomicUsize::new(0);

impl Component for Counted {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new().default_with(|| {
            COUNTED.fetch_add(1, Ordering::SeqCst);
            Counted
        })
    }
}

#[test]
fn test_lazy_defers_and_caches() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Counted>().unwrap().as_self();
    let container = builder.build();

    let before = COUNTED.load(Ordering::SeqCst);
    let lazy = container.resolve::<Lazy<Arc<Counted>>>().unwrap();
    assert!(!lazy.is_value_created());
    assert_eq!(COUNTED.load(Ordering::SeqCst), before);

    let first = lazy.get().unwrap().clone();
    let second = lazy.get().unwrap().clone();
    assert!(lazy.is_value_created());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_supplier_resolves_on_each_call() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Alpha>().unwrap().as_self();
    let container = builder.build();

    let supplier = container.resolve::<Supplier<Arc<Alpha>>>().unwrap();
    let a = supplier.get().unwrap();
    let b = supplier.get().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[derive(Default)]
struct Connection {
    closed: AtomicBool,
}

impl Dispose for Connection {
    fn dispose(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Component for Connection {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new().with_default().disposable()
    }
}

#[test]
fn test_owned_instance_is_not_tracked_by_the_scope() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Connection>().unwrap().as_self();
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let owned = scope.resolve::<Owned<Connection>>().unwrap();
    assert_eq!(scope.pending_disposals(), 0);

    scope.dispose();
    assert!(!owned.closed.load(Ordering::SeqCst));

    owned.dispose();
    assert!(owned.closed.load(Ordering::SeqCst));
    owned.dispose();
}

#[test]
fn test_owned_scoped_component_is_rejected() {
    let mut builder = ContainerBuilder::new();
    builder.register_scoped::<Connection>().unwrap().as_self();
    let container = builder.build();

    match container.resolve_owned::<Connection>() {
        Err(DiError::OwnedScopedComponent(name)) => assert!(name.contains("Connection")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_owned_only_releases_the_top_level_instance() {
    struct Session {
        connection: Arc<Connection>,
    }
    impl Component for Session {
        fn describe() -> TypeDescriptor<Self> {
            TypeDescriptor::new().initializer(|connection: Arc<Connection>| Session { connection })
        }
    }

    let mut builder = ContainerBuilder::new();
    builder.register::<Connection>().unwrap().as_self();
    builder.register::<Session>().unwrap().as_self();
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let session = scope.resolve::<Owned<Session>>().unwrap();
    // The dependency stays with the scope.
    assert_eq!(scope.pending_disposals(), 1);
    scope.dispose();
    assert!(session.connection.closed.load(Ordering::SeqCst));
}

/// A wrapper that hands disposal to its holder, like `Owned`.
struct Leased<T: ?Sized + Send + Sync + 'static> {
    value: Arc<T>,
    release: Option<Arc<dyn Dispose>>,
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Leased<T> {
    fn resolve_in(scope: &Scope) -> DiResult<Self> {
        let (value, release) = scope.resolve_owned_key(&Key::of::<T>())?.into_parts();
        let value = value
            .downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
        Ok(Leased { value, release })
    }
}

#[test]
fn test_custom_wrapper_can_take_ownership() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Connection>().unwrap().as_self();
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let leased = scope.resolve::<Leased<Connection>>().unwrap();
    assert_eq!(scope.pending_disposals(), 0);
    leased.release.as_ref().unwrap().dispose();
    assert!(leased.value.closed.load(Ordering::SeqCst));
}

#[test]
fn test_initialize_hook_can_resolve_its_own_registration() {
    struct Registry {
        seen_self: AtomicBool,
    }
    impl Initialize for Registry {
        fn initialize(&self, scope: &Scope) -> DiResult<()> {
            let me = scope.resolve::<Arc<Registry>>()?;
            self.seen_self
                .store(std::ptr::eq(Arc::as_ptr(&me), self), Ordering::SeqCst);
            Ok(())
        }
    }
    impl Component for Registry {
        fn describe() -> TypeDescriptor<Self> {
            TypeDescriptor::new()
                .default_with(|| Registry {
                    seen_self: AtomicBool::new(false),
                })
                .initializable()
        }
    }

    let mut builder = ContainerBuilder::new();
    builder.register_singleton::<Registry>().unwrap().as_self();
    let container = builder.build();

    let registry = container.resolve::<Arc<Registry>>().unwrap();
    assert!(registry.seen_self.load(Ordering::SeqCst));
}

#[test]
fn test_optional_dependency_through_try_resolve() {
    static PRESENT: OnceLock<bool> = OnceLock::new();

    struct Reporter;
    impl Component for Reporter {
        fn describe() -> TypeDescriptor<Self> {
            TypeDescriptor::new().initializer(|scope: Scope| {
                let plugin = scope.try_resolve::<Arc<dyn Plugin>>().ok().flatten();
                let _ = PRESENT.set(plugin.is_some());
                Reporter
            })
        }
    }

    let mut builder = ContainerBuilder::new();
    builder.register::<Reporter>().unwrap().as_self();
    let container = builder.build();
    container.resolve::<Arc<Reporter>>().unwrap();
    assert_eq!(PRESENT.get(), Some(&false));
}
