//! Container module system for modular registration.
//!
//! A module groups related registrations so an application can assemble
//! its container from reusable pieces.

use crate::collection::ContainerBuilder;
use crate::error::DiResult;

/// A module that can register services with a [`ContainerBuilder`].
///
/// Closures taking `&mut ContainerBuilder` are modules too.
///
/// # Example
///
/// ```rust
/// use lifescope::{Component, ContainerBuilder, ContainerModule, DiResult, Resolver, TypeDescriptor};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct UserConfig;
/// impl Component for UserConfig {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default()
///     }
/// }
///
/// struct UserService { config: Arc<UserConfig> }
/// impl Component for UserService {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().initializer(|config: Arc<UserConfig>| UserService { config })
///     }
/// }
///
/// struct UserModule;
///
/// impl ContainerModule for UserModule {
///     fn load(self, builder: &mut ContainerBuilder) -> DiResult<()> {
///         builder.register_singleton::<UserConfig>()?.as_self();
///         builder.register_scoped::<UserService>()?.as_self();
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut builder = ContainerBuilder::new();
/// builder.add_module(UserModule)?;
/// let container = builder.build();
/// let scope = container.begin_scope()?;
/// let service = scope.resolve::<Arc<UserService>>()?;
/// assert!(Arc::ptr_eq(&service.config, &container.resolve::<Arc<UserConfig>>()?));
/// # Ok(())
/// # }
/// ```
pub trait ContainerModule {
    /// Register this module's services with the builder.
    fn load(self, builder: &mut ContainerBuilder) -> DiResult<()>;
}

impl<F> ContainerModule for F
where
    F: FnOnce(&mut ContainerBuilder) -> DiResult<()>,
{
    fn load(self, builder: &mut ContainerBuilder) -> DiResult<()> {
        self(builder)
    }
}
