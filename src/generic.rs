//! Open generic templates.
//!
//! A template is registered once for a generic capability shape such as
//! `dyn Repository<_>` and materialized into an ordinary registration the
//! first time a closed form like `dyn Repository<User>` is requested. The
//! materialized registration is cached, so later requests behave exactly
//! as if it had been registered up front.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{Component, ComponentInfo};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;

/// Generic path plus arity, e.g. `dyn app::Repository` with one argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    path: String,
    arity: usize,
}

impl Shape {
    /// Shape of `T`; type arguments only fix the arity, so `dyn Repository<()>`
    /// has the same shape as `dyn Repository<User>`.
    pub fn of<T: ?Sized + 'static>() -> Shape {
        Shape::parse(std::any::type_name::<T>())
    }

    pub fn parse(name: &str) -> Shape {
        let Some(open) = name.find('<') else {
            return Shape {
                path: name.trim().to_string(),
                arity: 0,
            };
        };

        let mut depth = 0usize;
        let mut arity = 1usize;
        let mut previous = '\0';
        for ch in name[open..].chars() {
            let arrow = previous == '-';
            previous = ch;
            match ch {
                '<' | '(' | '[' => depth += 1,
                // `->` of a function type closes nothing
                '>' if arrow => {}
                '>' | ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                ',' if depth == 1 => arity += 1,
                _ => {}
            }
        }

        Shape {
            path: name[..open].trim().to_string(),
            arity,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.path)?;
        for i in 0..self.arity {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("_")?;
        }
        f.write_str(">")
    }
}

type Closer = Arc<dyn Fn(&Key) -> Option<ComponentInfo> + Send + Sync>;

/// A generic registration template for one capability shape.
///
/// # Examples
///
/// ```rust
/// use lifescope::{Component, ContainerBuilder, Lifetime, OpenGeneric, Resolver, Shape, TypeDescriptor};
/// use std::marker::PhantomData;
/// use std::sync::Arc;
///
/// trait Repository<T>: Send + Sync {
///     fn table(&self) -> &'static str;
/// }
///
/// struct User;
/// struct Order;
///
/// struct SqlRepository<T>(PhantomData<fn() -> T>);
/// impl<T: 'static> Repository<T> for SqlRepository<T> {
///     fn table(&self) -> &'static str {
///         std::any::type_name::<T>().rsplit("::").next().unwrap_or_default()
///     }
/// }
/// impl<T: 'static> Component for SqlRepository<T> {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new()
///             .default_with(|| SqlRepository(PhantomData))
///             .implements::<dyn Repository<T>>(|it| it)
///     }
/// }
///
/// let template = OpenGeneric::new(Shape::of::<dyn Repository<()>>(), Lifetime::Singleton)
///     .close::<dyn Repository<User>, SqlRepository<User>>()
///     .close::<dyn Repository<Order>, SqlRepository<Order>>();
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_open_generic(template).unwrap();
/// let container = builder.build();
///
/// let users = container.resolve::<Arc<dyn Repository<User>>>().unwrap();
/// assert_eq!(users.table(), "User");
/// let again = container.resolve::<Arc<dyn Repository<User>>>().unwrap();
/// assert!(Arc::ptr_eq(&users, &again));
/// ```
pub struct OpenGeneric {
    service: Shape,
    lifetime: Lifetime,
    closings: Vec<(Key, fn() -> ComponentInfo)>,
    closer: Option<Closer>,
}

impl OpenGeneric {
    pub fn new(service: Shape, lifetime: Lifetime) -> Self {
        Self {
            service,
            lifetime,
            closings: Vec::new(),
            closer: None,
        }
    }

    /// Declares that requests for `S` close the template with `I`.
    pub fn close<S, I>(mut self) -> Self
    where
        S: ?Sized + 'static,
        I: Component,
    {
        self.closings
            .push((Key::of::<S>(), ComponentInfo::of::<I> as fn() -> ComponentInfo));
        self
    }

    /// Closes the template at runtime for requests no declared closing covers.
    pub fn closer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Key) -> Option<ComponentInfo> + Send + Sync + 'static,
    {
        self.closer = Some(Arc::new(f));
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.service
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Declared closings must match the template's shape and be satisfiable.
    pub(crate) fn validate(&self) -> DiResult<()> {
        for (service, info) in &self.closings {
            let component = info();
            if Shape::parse(service.display_name()) != self.service || !component.satisfies(service) {
                return Err(DiError::IncompatibleType {
                    implementation: component.key().display_name(),
                    service: service.display_name(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn matches(&self, key: &Key) -> bool {
        Shape::parse(key.display_name()) == self.service
    }

    pub(crate) fn close_for(&self, key: &Key) -> Option<ComponentInfo> {
        if let Some((_, info)) = self.closings.iter().find(|(service, _)| service == key) {
            return Some(info());
        }
        self.closer.as_ref().and_then(|closer| closer(key))
    }
}

impl fmt::Debug for OpenGeneric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenGeneric")
            .field("service", &self.service)
            .field("lifetime", &self.lifetime)
            .field("closings", &self.closings.len())
            .field("has_closer", &self.closer.is_some())
            .finish()
    }
}
