/// Tests for the container builder and the module system
///
/// These tests cover registration-time validation, binding bookkeeping,
/// module composition, open generic templates and the container logger.

use lifescope::{
    Component, ComponentInfo, ContainerBuilder, ContainerModule, DiError, DiResult, Key,
    Lifetime, Logger, OpenGeneric, Resolver, Shape, TypeDescriptor,
};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

// ===== Test Services =====

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

trait Auditor: Send + Sync {}

#[derive(Default)]
struct EmailNotifier;

impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }
}

impl Component for EmailNotifier {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Notifier>(|it| it)
    }
}

#[derive(Default)]
struct SmsNotifier;

impl Notifier for SmsNotifier {
    fn channel(&self) -> &'static str {
        "sms"
    }
}

impl Auditor for SmsNotifier {}

impl Component for SmsNotifier {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Notifier>(|it| it)
            .implements::<dyn Auditor>(|it| it)
    }
}

// ===== Registration =====

#[test]
fn test_scoping_conflict_names_both_call_sites() {
    let mut builder = ContainerBuilder::new();
    let first_line = line!() + 1;
    builder.register_singleton::<EmailNotifier>().unwrap().as_self();
    let second_line = line!() + 1;
    let result = builder.register_scoped::<EmailNotifier>();

    match result {
        Err(DiError::ScopingConflict {
            implementation,
            first_lifetime,
            first,
            second_lifetime,
            second,
        }) => {
            assert!(implementation.contains("EmailNotifier"));
            assert_eq!(first_lifetime, "singleton");
            assert_eq!(second_lifetime, "scoped");
            assert_eq!(first.line(), first_line);
            assert_eq!(second.line(), second_line);
            assert!(first.file().ends_with("modules.rs"));
        }
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("conflict not detected"),
    }
}

#[test]
fn test_same_lifetime_extends_the_registration() {
    let mut builder = ContainerBuilder::new();
    builder
        .register_singleton::<SmsNotifier>()
        .unwrap()
        .as_service::<dyn Notifier>()
        .unwrap();
    builder
        .register_singleton::<SmsNotifier>()
        .unwrap()
        .as_service::<dyn Auditor>()
        .unwrap();
    let container = builder.build();

    let notifier = container.resolve::<Arc<dyn Notifier>>().unwrap();
    let auditor = container.resolve::<Arc<dyn Auditor>>().unwrap();
    assert_eq!(
        Arc::as_ptr(&notifier) as *const (),
        Arc::as_ptr(&auditor) as *const ()
    );
}

#[test]
fn test_undeclared_capability_is_rejected() {
    let mut builder = ContainerBuilder::new();
    let result = builder
        .register::<EmailNotifier>()
        .unwrap()
        .as_service::<dyn Auditor>();

    match result {
        Err(DiError::IncompatibleType {
            implementation,
            service,
        }) => {
            assert!(implementation.contains("EmailNotifier"));
            assert!(service.contains("Auditor"));
        }
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("binding accepted"),
    }
}

#[test]
fn test_descriptors_list_bindings_in_order() {
    let mut builder = ContainerBuilder::new();
    builder
        .register::<EmailNotifier>()
        .unwrap()
        .as_service::<dyn Notifier>()
        .unwrap();
    builder.register_scoped::<SmsNotifier>().unwrap();

    let descriptors = builder.descriptors();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].key, Key::of::<dyn Notifier>());
    assert_eq!(descriptors[0].lifetime, Lifetime::Transient);
    assert!(!descriptors[0].is_self_binding());
    assert!(descriptors[1].is_self_binding());
    assert_eq!(descriptors[1].lifetime, Lifetime::Scoped);

    assert!(builder.is_registered::<dyn Notifier>());
    assert!(!builder.is_registered::<dyn Auditor>());
}

#[test]
fn test_unbound_registration_binds_to_itself() {
    let mut builder = ContainerBuilder::new();
    builder.register_singleton::<EmailNotifier>().unwrap();
    let container = builder.build();

    assert!(container.resolve::<Arc<EmailNotifier>>().is_ok());
    assert!(container.try_resolve::<Arc<dyn Notifier>>().unwrap().is_none());
}

// ===== Modules =====

struct NotificationModule;

impl ContainerModule for NotificationModule {
    fn load(self, builder: &mut ContainerBuilder) -> DiResult<()> {
        builder
            .register_singleton::<EmailNotifier>()?
            .as_service::<dyn Notifier>()?;
        builder
            .register_singleton::<SmsNotifier>()?
            .as_service::<dyn Notifier>()?;
        Ok(())
    }
}

#[test]
fn test_module_registrations_are_applied() {
    let mut builder = ContainerBuilder::new();
    builder.add_module(NotificationModule).unwrap();
    let container = builder.build();

    let channels: Vec<_> = container
        .resolve_all::<dyn Notifier>()
        .unwrap()
        .iter()
        .map(|n| n.channel())
        .collect();
    assert_eq!(channels, vec!["email", "sms"]);
}

#[test]
fn test_closure_modules_and_propagated_errors() {
    let mut builder = ContainerBuilder::new();
    builder
        .add_module(|builder: &mut ContainerBuilder| -> DiResult<()> {
            builder.register_scoped::<EmailNotifier>()?.as_self();
            Ok(())
        })
        .unwrap();

    let result = builder.add_module(|builder: &mut ContainerBuilder| -> DiResult<()> {
        builder.register::<EmailNotifier>()?.as_self();
        Ok(())
    });
    assert!(matches!(result, Err(DiError::ScopingConflict { .. })));
}

// ===== Open generics =====

trait Repository<T>: Send + Sync {
    fn entity(&self) -> &'static str;
}

struct Account;
struct Invoice;

struct SqlRepository<T>(PhantomData<fn() -> T>);

impl<T: 'static> Repository<T> for SqlRepository<T> {
    fn entity(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: 'static> Component for SqlRepository<T> {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .default_with(|| SqlRepository(PhantomData))
            .implements::<dyn Repository<T>>(|it| it)
    }
}

#[test]
fn test_open_generic_materializes_each_closed_form_once() {
    let template = OpenGeneric::new(Shape::of::<dyn Repository<()>>(), Lifetime::Scoped)
        .close::<dyn Repository<Account>, SqlRepository<Account>>()
        .close::<dyn Repository<Invoice>, SqlRepository<Invoice>>();

    let mut builder = ContainerBuilder::new();
    builder.register_open_generic(template).unwrap();
    let container = builder.build();
    let scope = container.begin_scope().unwrap();

    let accounts = scope.resolve::<Arc<dyn Repository<Account>>>().unwrap();
    let again = scope.resolve::<Arc<dyn Repository<Account>>>().unwrap();
    let invoices = scope.resolve::<Arc<dyn Repository<Invoice>>>().unwrap();
    assert!(Arc::ptr_eq(&accounts, &again));
    assert!(accounts.entity().ends_with("Account"));
    assert!(invoices.entity().ends_with("Invoice"));

    let materialized = container
        .descriptors()
        .into_iter()
        .filter(|d| d.registered_at.is_none() && d.type_name().contains("Repository"))
        .count();
    assert_eq!(materialized, 2);
}

#[test]
fn test_open_generic_runtime_closer() {
    struct Report;

    let template = OpenGeneric::new(Shape::of::<dyn Repository<()>>(), Lifetime::Transient)
        .closer(|key| {
            (*key == Key::of::<dyn Repository<Report>>())
                .then(ComponentInfo::of::<SqlRepository<Report>>)
        });

    let mut builder = ContainerBuilder::new();
    builder.register_open_generic(template).unwrap();
    let container = builder.build();

    assert!(container.resolve::<Arc<dyn Repository<Report>>>().is_ok());
    assert!(container
        .try_resolve::<Arc<dyn Repository<Account>>>()
        .unwrap()
        .is_none());
}

#[test]
fn test_open_generic_rejects_mismatched_closing() {
    let template = OpenGeneric::new(Shape::of::<dyn Repository<()>>(), Lifetime::Singleton)
        .close::<dyn Repository<Account>, SqlRepository<Invoice>>();

    let mut builder = ContainerBuilder::new();
    let result = builder.register_open_generic(template);
    assert!(matches!(result, Err(DiError::IncompatibleType { .. })));
}

#[test]
fn test_open_generic_populates_sequences() {
    let template = OpenGeneric::new(Shape::of::<dyn Repository<()>>(), Lifetime::Singleton)
        .close::<dyn Repository<Account>, SqlRepository<Account>>();

    let mut builder = ContainerBuilder::new();
    builder.register_open_generic(template).unwrap();
    let container = builder.build();

    assert_eq!(container.resolve_all::<dyn Repository<Account>>().unwrap().len(), 1);
}

// ===== Logger =====

#[derive(Default)]
struct CapturingLogger {
    entries: Mutex<Vec<String>>,
}

impl Logger for CapturingLogger {
    fn debug(&self, _message: &str) {}

    fn log(&self, message: &str) {
        self.entries.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.log(message);
    }

    fn exception(&self, message: &str, cause: &dyn std::error::Error) {
        self.log(&format!("{message}: {cause}"));
    }
}

impl Component for CapturingLogger {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Logger>(|it| it)
    }
}

#[test]
fn test_default_logger_is_registered() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("lifescope=debug"))
        .with_test_writer()
        .try_init();

    let container = ContainerBuilder::new().build();
    assert!(container.resolve::<Arc<dyn Logger>>().is_ok());
    assert!(container
        .descriptors()
        .iter()
        .any(|d| d.key == Key::of::<dyn Logger>()));

    // Goes through the tracing subscriber installed above.
    container.resolve::<Arc<dyn Logger>>().unwrap().log("container ready");
}

#[test]
fn test_construction_failures_reach_the_registered_logger() {
    struct Broken;
    impl Component for Broken {
        fn describe() -> TypeDescriptor<Self> {
            TypeDescriptor::new().try_initializer(|| -> DiResult<Broken> {
                Err(DiError::initializer_failed("Broken", "disk full"))
            })
        }
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register_singleton::<CapturingLogger>()
        .unwrap()
        .as_service::<dyn Logger>()
        .unwrap()
        .as_self();
    builder.register::<Broken>().unwrap().as_self();
    let container = builder.build();

    assert!(container.resolve::<Arc<Broken>>().is_err());

    let logger = container.resolve::<Arc<CapturingLogger>>().unwrap();
    let entries = logger.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("Broken"));
    assert!(entries[0].contains("disk full"));
}
