//! Error types for the dependency injection container.

use std::panic::Location;

use thiserror::Error;

/// Dependency injection errors
///
/// Registration-time kinds (`IncompatibleType`, `ScopingConflict`) are raised by
/// [`ContainerBuilder`](crate::ContainerBuilder); everything else is raised while
/// resolving. None of them are swallowed by the container.
///
/// # Examples
///
/// ```rust
/// use lifescope::{ContainerBuilder, DiError, Resolver};
/// use std::sync::Arc;
///
/// trait Missing: Send + Sync {}
///
/// let container = ContainerBuilder::new().build();
/// match container.resolve::<Arc<dyn Missing>>() {
///     Err(DiError::ResolveUnregisteredInterface(name)) => {
///         assert!(name.contains("Missing"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Implementing type does not declare the requested capability
    #[error("{implementation} cannot be bound as {service}: capability not declared")]
    IncompatibleType {
        implementation: &'static str,
        service: &'static str,
    },

    /// Same implementing type registered under two different lifetimes
    #[error(
        "{implementation} registered as {first_lifetime} at {first} and as {second_lifetime} at {second}"
    )]
    ScopingConflict {
        implementation: &'static str,
        first_lifetime: &'static str,
        first: &'static Location<'static>,
        second_lifetime: &'static str,
        second: &'static Location<'static>,
    },

    /// Capability type with no registration and no fallback
    #[error("No registration or fallback for capability {0}")]
    ResolveUnregisteredInterface(&'static str),

    /// Provider returned nothing for a required service
    #[error("Required service {0} was not provided")]
    ResolveUnregisteredService(&'static str),

    /// Building the object graph failed
    #[error("Failed to construct {service}: {cause}")]
    ResolveConstruction {
        service: &'static str,
        #[source]
        cause: Box<DiError>,
    },

    /// Ownership transfer requested for a scoped or singleton registration
    #[error("{0} has a scoped or singleton lifetime and cannot be owned by the caller")]
    OwnedScopedComponent(&'static str),

    /// Resolution attempted through a disposed scope
    #[error("Scope {0} has been disposed")]
    DisposedScope(u64),

    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),

    /// Resolution nested deeper than the supported limit
    #[error("Resolution depth exceeded {0}")]
    DepthExceeded(usize),

    /// Ambient container accessed before `ambient::init`
    #[error("Ambient container is not initialized")]
    AmbientNotInitialized,

    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// Type has neither an initializer nor a default value
    #[error("{0} declares no initializer and no default")]
    NoInitializer(&'static str),

    /// Unregistered concrete type whose descriptor the container never saw
    #[error("{0} is not registered and was never described to the container")]
    NotDescribed(&'static str),

    /// User initializer, factory or hook reported a failure or panicked
    #[error("Initializer of {service} failed: {message}")]
    InitializerFailed {
        service: &'static str,
        message: String,
    },
}

impl DiError {
    /// Wraps `cause` as a construction failure of `service`.
    pub fn construction(service: &'static str, cause: DiError) -> Self {
        DiError::ResolveConstruction {
            service,
            cause: Box::new(cause),
        }
    }

    /// Convenience constructor for failures raised by user code.
    pub fn initializer_failed(service: &'static str, message: impl Into<String>) -> Self {
        DiError::InitializerFailed {
            service,
            message: message.into(),
        }
    }

    /// Follows `ResolveConstruction` wrappers down to the first non-wrapper cause.
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        while let DiError::ResolveConstruction { cause, .. } = current {
            current = cause;
        }
        current
    }
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout lifescope.
///
/// # Examples
///
/// ```rust
/// use lifescope::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::ResolveUnregisteredService("some_service"))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
