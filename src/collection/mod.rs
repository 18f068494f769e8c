//! Container builder for registering components.

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use crate::descriptor::{Component, ComponentInfo, Constructor};
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::fallback::{DefaultImplementations, FallbackContext, FallbackResolver, Nomination};
use crate::generic::OpenGeneric;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::logger::{Logger, TracingLogger};
use crate::provider::{Container, Scope, Shared};
use crate::registration::{AnyArc, Binding, Map, Registration, RegistrationId, Registry};

pub mod module_system;

pub use module_system::ContainerModule;

/// A registration under construction.
struct Draft {
    component: ComponentInfo,
    lifetime: Lifetime,
    factory: Option<Constructor>,
    external: bool,
    registered_at: &'static Location<'static>,
    bound: bool,
}

struct PendingBinding {
    service: Key,
    draft: usize,
    registered_at: &'static Location<'static>,
}

/// Collects registrations and freezes them into a [`Container`].
///
/// Every implementing type has at most one registration. Registering a type
/// again under the same lifetime returns that registration, so further
/// bindings accumulate on it; registering it under a different lifetime is a
/// [`DiError::ScopingConflict`] naming both call sites.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, DiError, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// trait Notifier: Send + Sync {}
///
/// #[derive(Default)]
/// struct Email;
/// impl Notifier for Email {}
/// impl Component for Email {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().implements::<dyn Notifier>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<Email>().unwrap().as_service::<dyn Notifier>().unwrap();
///
/// // Same type, different lifetime.
/// assert!(matches!(
///     builder.register_scoped::<Email>(),
///     Err(DiError::ScopingConflict { .. })
/// ));
///
/// let container = builder.build();
/// assert!(container.resolve::<Arc<dyn Notifier>>().is_ok());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    drafts: Vec<Draft>,
    by_implementation: Map<Key, usize>,
    bindings: Vec<PendingBinding>,
    catalog: Map<Key, ComponentInfo>,
    fallbacks: Vec<Arc<dyn FallbackResolver>>,
    defaults: DefaultImplementations,
    generics: Vec<OpenGeneric>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` as transient: a new instance per resolution.
    #[track_caller]
    pub fn register<T: Component>(&mut self) -> DiResult<RegistrationBuilder<'_, T>> {
        self.add::<T>(Lifetime::Transient, None, false, Location::caller())
    }

    /// Registers `T` as a singleton, materialized once in the root scope.
    #[track_caller]
    pub fn register_singleton<T: Component>(&mut self) -> DiResult<RegistrationBuilder<'_, T>> {
        self.add::<T>(Lifetime::Singleton, None, false, Location::caller())
    }

    /// Registers `T` as scoped: one instance per scope.
    #[track_caller]
    pub fn register_scoped<T: Component>(&mut self) -> DiResult<RegistrationBuilder<'_, T>> {
        self.add::<T>(Lifetime::Scoped, None, false, Location::caller())
    }

    /// Registers `T` with a factory that replaces initializer selection.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifescope::{Component, ContainerBuilder, Lifetime, Resolver, TypeDescriptor};
    /// use std::sync::Arc;
    ///
    /// struct Settings { url: String }
    /// impl Component for Settings {
    ///     fn describe() -> TypeDescriptor<Self> {
    ///         TypeDescriptor::new()
    ///     }
    /// }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder
    ///     .register_factory(Lifetime::Singleton, |_| Ok(Settings { url: "postgres://db".into() }))
    ///     .unwrap()
    ///     .as_self();
    /// let container = builder.build();
    /// assert_eq!(container.resolve::<Arc<Settings>>().unwrap().url, "postgres://db");
    /// ```
    #[track_caller]
    pub fn register_factory<T, F>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
    ) -> DiResult<RegistrationBuilder<'_, T>>
    where
        T: Component,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: Constructor =
            Arc::new(move |scope: &Scope| factory(scope).map(|value| Arc::new(value) as AnyArc));
        self.add::<T>(lifetime, Some(factory), false, Location::caller())
    }

    /// Registers a pre-built singleton. The container never disposes it.
    #[track_caller]
    pub fn register_instance<T: Component>(
        &mut self,
        instance: T,
    ) -> DiResult<RegistrationBuilder<'_, T>> {
        let instance: AnyArc = Arc::new(instance);
        let factory: Constructor = Arc::new(move |_: &Scope| Ok(instance.clone()));
        self.add::<T>(Lifetime::Singleton, Some(factory), true, Location::caller())
    }

    fn add<T: Component>(
        &mut self,
        lifetime: Lifetime,
        factory: Option<Constructor>,
        external: bool,
        location: &'static Location<'static>,
    ) -> DiResult<RegistrationBuilder<'_, T>> {
        let implementation = Key::of::<T>();

        if let Some(&index) = self.by_implementation.get(&implementation) {
            let draft = &mut self.drafts[index];
            if draft.lifetime != lifetime {
                return Err(DiError::ScopingConflict {
                    implementation: implementation.display_name(),
                    first_lifetime: draft.lifetime.as_str(),
                    first: draft.registered_at,
                    second_lifetime: lifetime.as_str(),
                    second: location,
                });
            }
            if factory.is_some() {
                draft.factory = factory;
                draft.external = external;
            }
            return Ok(RegistrationBuilder::new(self, index, location));
        }

        let component = self
            .catalog
            .entry(implementation)
            .or_insert_with(ComponentInfo::of::<T>)
            .clone();
        component.seed_dependencies(&mut self.catalog);
        let index = self.drafts.len();
        self.drafts.push(Draft {
            component,
            lifetime,
            factory,
            external,
            registered_at: location,
            bound: false,
        });
        self.by_implementation.insert(implementation, index);
        tracing::trace!(
            implementation = implementation.display_name(),
            lifetime = lifetime.as_str(),
            "registered component"
        );
        Ok(RegistrationBuilder::new(self, index, location))
    }

    /// Makes `T` constructible by resolution without registering it.
    pub fn describe<T: Component>(&mut self) -> &mut Self {
        let component = self
            .catalog
            .entry(Key::of::<T>())
            .or_insert_with(ComponentInfo::of::<T>)
            .clone();
        component.seed_dependencies(&mut self.catalog);
        self
    }

    /// Loads a module's registrations.
    pub fn add_module<M: ContainerModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.load(self)?;
        Ok(self)
    }

    /// Adds a resolver consulted, in insertion order, for capabilities with no registration.
    pub fn fallback_resolver<F>(&mut self, resolver: F) -> &mut Self
    where
        F: Fn(&FallbackContext<'_>) -> Option<Nomination> + Send + Sync + 'static,
    {
        self.add_fallback(resolver)
    }

    pub fn add_fallback<R: FallbackResolver + 'static>(&mut self, resolver: R) -> &mut Self {
        self.fallbacks.push(Arc::new(resolver));
        self
    }

    /// Declares the implementation used for `S` when nothing else provides it.
    ///
    /// Consulted after every fallback resolver. Memoized lifetimes cache the
    /// decision; `Transient` constructs a new instance per request.
    pub fn default_implementation<S, I>(&mut self, lifetime: Lifetime) -> DiResult<&mut Self>
    where
        S: ?Sized + 'static,
        I: Component,
    {
        let service = Key::of::<S>();
        let component = ComponentInfo::of::<I>();
        if !component.satisfies(&service) {
            return Err(DiError::IncompatibleType {
                implementation: component.key().display_name(),
                service: service.display_name(),
            });
        }
        component.seed_dependencies(&mut self.catalog);
        let nomination = match lifetime {
            Lifetime::Transient => Nomination::component(component),
            memoized => Nomination::component(component).cached(memoized),
        };
        self.defaults.insert(service, nomination);
        Ok(self)
    }

    /// Registers an open generic template, validating its declared closings.
    pub fn register_open_generic(&mut self, template: OpenGeneric) -> DiResult<&mut Self> {
        template.validate()?;
        self.generics.push(template);
        Ok(self)
    }

    /// True when some registration is bound to `S`.
    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        let service = Key::of::<S>();
        self.bindings.iter().any(|b| b.service == service)
    }

    /// Bindings registered so far, in registration order.
    ///
    /// Registrations without an explicit binding are listed once bound to
    /// themselves, matching what [`build`](Self::build) produces.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        let explicit = self.bindings.iter().map(|binding| {
            let draft = &self.drafts[binding.draft];
            ServiceDescriptor {
                key: binding.service,
                implementation: draft.component.key(),
                lifetime: draft.lifetime,
                registered_at: Some(binding.registered_at),
            }
        });
        let implicit = self.drafts.iter().filter(|d| !d.bound).map(|draft| ServiceDescriptor {
            key: draft.component.key(),
            implementation: draft.component.key(),
            lifetime: draft.lifetime,
            registered_at: Some(draft.registered_at),
        });
        explicit.chain(implicit).collect()
    }

    /// Freezes the registrations into a container.
    ///
    /// Registrations never bound to a service are bound to themselves, and
    /// [`TracingLogger`] becomes the `dyn Logger` unless one is registered.
    /// The container resolves itself as `Container` and each scope as `Scope`.
    #[track_caller]
    pub fn build(mut self) -> Container {
        for index in 0..self.drafts.len() {
            if !self.drafts[index].bound {
                let draft = &self.drafts[index];
                self.bindings.push(PendingBinding {
                    service: draft.component.key(),
                    draft: index,
                    registered_at: draft.registered_at,
                });
            }
        }

        if !self.is_registered::<dyn Logger>() {
            let location = Location::caller();
            if let Ok(registration) =
                self.add::<TracingLogger>(Lifetime::Singleton, None, false, location)
            {
                registration.bind(Key::of::<dyn Logger>());
            }
        }

        let registrations: Vec<Arc<Registration>> = self
            .drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                Arc::new(Registration::new(
                    RegistrationId(index),
                    draft.component,
                    draft.lifetime,
                    draft.factory,
                    draft.external,
                ))
            })
            .collect();

        let mut registry = Registry::new(registrations.len());
        for pending in self.bindings {
            registry.bind(Binding {
                service: pending.service,
                registration: registrations[pending.draft].clone(),
                registered_at: Some(pending.registered_at),
            });
        }

        tracing::debug!(
            registrations = registrations.len(),
            bindings = registry.bindings().len(),
            fallbacks = self.fallbacks.len(),
            defaults = self.defaults.len(),
            templates = self.generics.len(),
            "container built"
        );

        Container::new(Shared::new(
            registry,
            self.fallbacks,
            self.defaults,
            self.generics,
            self.catalog,
        ))
    }
}

/// Binds a registration to the services it provides.
pub struct RegistrationBuilder<'a, T> {
    builder: &'a mut ContainerBuilder,
    draft: usize,
    location: &'static Location<'static>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Component> RegistrationBuilder<'a, T> {
    fn new(builder: &'a mut ContainerBuilder, draft: usize, location: &'static Location<'static>) -> Self {
        Self {
            builder,
            draft,
            location,
            _marker: PhantomData,
        }
    }

    /// Exposes the registration as `S`, which `T` must declare through
    /// [`TypeDescriptor::implements`](crate::TypeDescriptor::implements).
    pub fn as_service<S: ?Sized + 'static>(self) -> DiResult<Self> {
        let service = Key::of::<S>();
        let component = &self.builder.drafts[self.draft].component;
        if !component.satisfies(&service) {
            return Err(DiError::IncompatibleType {
                implementation: component.key().display_name(),
                service: service.display_name(),
            });
        }
        Ok(self.bind(service))
    }

    /// Exposes the registration as its own implementing type.
    pub fn as_self(self) -> Self {
        self.bind(Key::of::<T>())
    }

    pub fn lifetime(&self) -> Lifetime {
        self.builder.drafts[self.draft].lifetime
    }

    fn bind(self, service: Key) -> Self {
        self.builder.drafts[self.draft].bound = true;
        self.builder.bindings.push(PendingBinding {
            service,
            draft: self.draft,
            registered_at: self.location,
        });
        self
    }
}
