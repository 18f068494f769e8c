//! Type descriptors: the construction metadata of implementing types.
//!
//! A descriptor is computed once, when a type is registered, and lists the
//! type's initializers (with their parameter types), its optional default
//! value, the capabilities it can be bound to, and whether it is disposable
//! or carries an initialization hook.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::Scope;
use crate::registration::{AnyArc, Map};
use crate::resolvable::Resolvable;
use crate::traits::{Dispose, Initialize};

pub(crate) type Constructor = Arc<dyn Fn(&Scope) -> DiResult<AnyArc> + Send + Sync>;
type Cast = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;
type Disposer = fn(&AnyArc) -> Option<Arc<dyn Dispose>>;
type Hook = fn(&AnyArc, &Scope) -> DiResult<()>;
type Describe = fn() -> ComponentInfo;

/// A type the container knows how to construct.
///
/// # Examples
///
/// ```rust
/// use lifescope::{Component, ContainerBuilder, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct Config { name: String }
/// impl Component for Config {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().default_with(|| Config { name: "world".into() })
///     }
/// }
///
/// struct Hello { config: Arc<Config> }
/// impl Greeter for Hello {
///     fn greet(&self) -> String { format!("hello {}", self.config.name) }
/// }
/// impl Component for Hello {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new()
///             .initializer(|config: Arc<Config>| Hello { config })
///             .implements::<dyn Greeter>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<Config>().unwrap().as_self();
/// builder.register::<Hello>().unwrap().as_service::<dyn Greeter>().unwrap();
/// let container = builder.build();
///
/// let greeter = container.resolve::<Arc<dyn Greeter>>().unwrap();
/// assert_eq!(greeter.greet(), "hello world");
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    fn describe() -> TypeDescriptor<Self>;
}

/// Tuple of injectable parameters of an initializer.
pub trait Params: Sized + 'static {
    /// Type names of the parameters, in declaration order.
    fn names() -> Vec<&'static str>;
    fn resolve_in(scope: &Scope) -> DiResult<Self>;
}

/// A function taking its parameters as a tuple.
pub trait Callable<Args, Ret>: Send + Sync + 'static {
    fn call(&self, args: Args) -> Ret;
}

macro_rules! params_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Callable<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
    {
        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Ret {
            (self)($($param,)*)
        }
    }

    #[allow(clippy::unused_unit)]
    impl<$($param: Resolvable,)*> Params for ($($param,)*) {
        fn names() -> Vec<&'static str> {
            vec![$(std::any::type_name::<$param>()),*]
        }

        #[inline]
        fn resolve_in(_scope: &Scope) -> DiResult<Self> {
            Ok(($($param::resolve_in(_scope)?,)*))
        }
    }
});

params_tuple! {}
params_tuple! { A }
params_tuple! { A B }
params_tuple! { A B C }
params_tuple! { A B C D }
params_tuple! { A B C D E }
params_tuple! { A B C D E F }
params_tuple! { A B C D E F G }
params_tuple! { A B C D E F G H }

#[derive(Clone)]
pub(crate) struct Initializer {
    params: Vec<&'static str>,
    invoke: Constructor,
}

/// Construction metadata for `T`, built through [`Component::describe`].
pub struct TypeDescriptor<T> {
    initializers: Vec<Initializer>,
    default: Option<Constructor>,
    casts: Vec<(Key, Cast)>,
    disposer: Option<Disposer>,
    hook: Option<Hook>,
    dependencies: Vec<(Key, Describe)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> TypeDescriptor<T> {
    pub fn new() -> Self {
        Self {
            initializers: Vec::new(),
            default: None,
            casts: Vec::new(),
            disposer: None,
            hook: None,
            dependencies: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares an initializer; its parameters are resolved from the scope.
    ///
    /// When several initializers are declared, the one with the most
    /// parameters is used; ties go to the one declared first.
    pub fn initializer<Args, F>(self, f: F) -> Self
    where
        Args: Params,
        F: Callable<Args, T>,
    {
        self.push_initializer::<Args>(Arc::new(move |scope: &Scope| {
            let args = Args::resolve_in(scope)?;
            Ok(Arc::new(f.call(args)) as AnyArc)
        }))
    }

    /// Declares a fallible initializer.
    pub fn try_initializer<Args, F>(self, f: F) -> Self
    where
        Args: Params,
        F: Callable<Args, DiResult<T>>,
    {
        self.push_initializer::<Args>(Arc::new(move |scope: &Scope| {
            let args = Args::resolve_in(scope)?;
            Ok(Arc::new(f.call(args)?) as AnyArc)
        }))
    }

    fn push_initializer<Args: Params>(mut self, invoke: Constructor) -> Self {
        self.initializers.push(Initializer {
            params: Args::names(),
            invoke,
        });
        self
    }

    /// Uses `T::default()` when no initializer is declared.
    pub fn with_default(self) -> Self
    where
        T: Default,
    {
        self.default_with(T::default)
    }

    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move |_: &Scope| Ok(Arc::new(f()) as AnyArc)));
        self
    }

    /// Declares that `T` satisfies the capability `S`.
    pub fn implements<S>(mut self, upcast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let cast: Cast = Arc::new(move |instance: &AnyArc| {
            let concrete = instance.clone().downcast::<T>().ok()?;
            Some(Arc::new(upcast(concrete)) as AnyArc)
        });
        self.casts.push((Key::of::<S>(), cast));
        self
    }

    /// Makes the concrete dependency `D` constructible without registering it.
    ///
    /// Whenever the container learns about `T` it also learns about `D`, and
    /// transitively about whatever `D` depends on, so an initializer taking
    /// `Arc<D>` builds `D` as a transient when nothing is registered for it.
    pub fn depends_on<D: Component>(mut self) -> Self {
        self.dependencies
            .push((Key::of::<D>(), ComponentInfo::of::<D> as Describe));
        self
    }

    /// Registers instances of `T` for disposal with the scope that built them.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.disposer = Some(|instance: &AnyArc| {
            let concrete = instance.clone().downcast::<T>().ok()?;
            Some(concrete as Arc<dyn Dispose>)
        });
        self
    }

    /// Runs [`Initialize::initialize`] after construction.
    pub fn initializable(mut self) -> Self
    where
        T: Initialize,
    {
        self.hook = Some(|instance: &AnyArc, scope: &Scope| match instance.clone().downcast::<T>() {
            Ok(concrete) => concrete.initialize(scope),
            Err(_) => Err(DiError::TypeMismatch(std::any::type_name::<T>())),
        });
        self
    }

    /// Erases the descriptor, selecting the richest initializer.
    pub fn into_info(self) -> ComponentInfo {
        let key = Key::of::<T>();
        let mut casts: Map<TypeId, Cast> = Map::default();
        casts.insert(
            key.type_id(),
            Arc::new(|instance: &AnyArc| {
                let concrete = instance.clone().downcast::<T>().ok()?;
                Some(Arc::new(concrete) as AnyArc)
            }),
        );
        let mut capabilities = Vec::with_capacity(self.casts.len());
        for (service, cast) in self.casts {
            capabilities.push(service);
            casts.insert(service.type_id(), cast);
        }

        let mut selected: Option<usize> = None;
        for (index, init) in self.initializers.iter().enumerate() {
            let richer = match selected {
                Some(current) => init.params.len() > self.initializers[current].params.len(),
                None => true,
            };
            if richer {
                selected = Some(index);
            }
        }

        ComponentInfo {
            inner: Arc::new(ComponentInner {
                key,
                initializers: self.initializers,
                selected,
                default: self.default,
                casts,
                capabilities,
                disposer: self.disposer,
                hook: self.hook,
                dependencies: self.dependencies,
            }),
        }
    }
}

impl<T: Component> Default for TypeDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct ComponentInner {
    key: Key,
    initializers: Vec<Initializer>,
    selected: Option<usize>,
    default: Option<Constructor>,
    casts: Map<TypeId, Cast>,
    capabilities: Vec<Key>,
    disposer: Option<Disposer>,
    hook: Option<Hook>,
    dependencies: Vec<(Key, Describe)>,
}

/// Type-erased descriptor of an implementing type.
#[derive(Clone)]
pub struct ComponentInfo {
    inner: Arc<ComponentInner>,
}

impl ComponentInfo {
    pub fn of<T: Component>() -> Self {
        T::describe().into_info()
    }

    /// Key of the implementing type.
    pub fn key(&self) -> Key {
        self.inner.key
    }

    /// Capabilities declared with [`TypeDescriptor::implements`].
    pub fn capabilities(&self) -> &[Key] {
        &self.inner.capabilities
    }

    /// True when the type can be bound as `service` (itself or a declared capability).
    pub fn satisfies(&self, service: &Key) -> bool {
        self.inner.casts.contains_key(&service.type_id())
    }

    /// Parameter type names of the initializer that construction will use.
    pub fn selected_params(&self) -> Option<&[&'static str]> {
        self.inner
            .selected
            .map(|index| self.inner.initializers[index].params.as_slice())
    }

    pub fn initializer_count(&self) -> usize {
        self.inner.initializers.len()
    }

    pub fn is_disposable(&self) -> bool {
        self.inner.disposer.is_some()
    }

    /// Concrete dependencies declared with [`TypeDescriptor::depends_on`].
    pub fn dependencies(&self) -> impl Iterator<Item = Key> + '_ {
        self.inner.dependencies.iter().map(|(key, _)| *key)
    }

    /// Adds every transitive dependency missing from `catalog`.
    pub(crate) fn seed_dependencies(&self, catalog: &mut Map<Key, ComponentInfo>) {
        let mut pending = self.inner.dependencies.clone();
        while let Some((key, describe)) = pending.pop() {
            if catalog.contains_key(&key) {
                continue;
            }
            let info = describe();
            pending.extend(info.inner.dependencies.iter().copied());
            catalog.insert(key, info);
        }
    }

    pub(crate) fn construct(&self, scope: &Scope) -> DiResult<AnyArc> {
        if let Some(index) = self.inner.selected {
            return (self.inner.initializers[index].invoke)(scope);
        }
        match &self.inner.default {
            Some(default) => default(scope),
            None => Err(DiError::NoInitializer(self.inner.key.display_name())),
        }
    }

    /// Converts a constructed instance into the erased `Arc<S>` of `service`.
    pub(crate) fn cast(&self, service: &Key, instance: &AnyArc) -> Option<AnyArc> {
        let cast = self.inner.casts.get(&service.type_id())?;
        cast(instance)
    }

    pub(crate) fn disposer(&self, instance: &AnyArc) -> Option<Arc<dyn Dispose>> {
        self.inner.disposer.and_then(|disposer| disposer(instance))
    }

    pub(crate) fn initialize(&self, instance: &AnyArc, scope: &Scope) -> DiResult<()> {
        match self.inner.hook {
            Some(hook) => hook(instance, scope),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("key", &self.inner.key)
            .field("capabilities", &self.inner.capabilities)
            .field("initializers", &self.inner.initializers.len())
            .field("selected", &self.selected_params())
            .finish()
    }
}
