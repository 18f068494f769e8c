//! Container logging.
//!
//! The container reports construction failures through a [`Logger`] service
//! before returning the error to the caller. A container always has one:
//! unless another implementation is bound to `dyn Logger`, the builder
//! registers [`TracingLogger`] as a singleton.

use std::error::Error;

use crate::descriptor::{Component, TypeDescriptor};

/// Logging sink resolved from the container itself.
///
/// # Examples
///
/// ```
/// use lifescope::{Component, ContainerBuilder, Logger, Resolver, TypeDescriptor};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Captured(Mutex<Vec<String>>);
///
/// impl Logger for Captured {
///     fn debug(&self, _: &str) {}
///     fn log(&self, message: &str) { self.0.lock().unwrap().push(message.to_string()); }
///     fn error(&self, message: &str) { self.log(message) }
///     fn exception(&self, message: &str, cause: &dyn std::error::Error) {
///         self.log(&format!("{message}: {cause}"))
///     }
/// }
///
/// impl Component for Captured {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::new().with_default().implements::<dyn Logger>(|it| it)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<Captured>().unwrap().as_service::<dyn Logger>().unwrap().as_self();
/// let container = builder.build();
///
/// let logger = container.resolve::<Arc<dyn Logger>>().unwrap();
/// logger.log("ready");
/// assert_eq!(container.resolve::<Arc<Captured>>().unwrap().0.lock().unwrap().len(), 1);
/// ```
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn log(&self, message: &str);
    fn error(&self, message: &str);
    /// Reports `message` together with the error that caused it.
    fn exception(&self, message: &str, cause: &dyn Error);
}

/// Default [`Logger`] emitting `tracing` events under the `lifescope` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "lifescope", "{}", message);
    }

    fn log(&self, message: &str) {
        tracing::info!(target: "lifescope", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "lifescope", "{}", message);
    }

    fn exception(&self, message: &str, cause: &dyn Error) {
        tracing::error!(target: "lifescope", error = %cause, "{}", message);
    }
}

impl Component for TracingLogger {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new()
            .with_default()
            .implements::<dyn Logger>(|it| it)
    }
}
