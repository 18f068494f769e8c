//! # lifescope
//!
//! Registration-driven dependency injection with nested lifetime scopes.
//!
//! ## Features
//!
//! - **Lifetimes**: transient, scoped (one per scope) and singleton (one per container)
//! - **Scope trees**: child scopes with deterministic, reverse-order disposal
//! - **Initializer selection**: the richest declared initializer wins
//! - **Special forms**: `Lazy`, `Supplier`, `Owned`, `Vec<Arc<T>>`, `Scope` and `Container`
//! - **Fallbacks**: custom resolvers and default implementations for unregistered capabilities
//! - **Open generics**: one template closed on demand for each generic instantiation
//! - **Circular dependency detection**: with the full dependency path in the error
//!
//! ## Quick Start
//!
//! ```rust
//! use lifescope::{Component, ContainerBuilder, Resolver, TypeDescriptor};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! struct Settings {
//!     greeting: String,
//! }
//! impl Component for Settings {
//!     fn describe() -> TypeDescriptor<Self> {
//!         TypeDescriptor::new().default_with(|| Settings { greeting: "Hello".into() })
//!     }
//! }
//!
//! struct PoliteGreeter {
//!     settings: Arc<Settings>,
//! }
//! impl Greeter for PoliteGreeter {
//!     fn greet(&self, name: &str) -> String {
//!         format!("{}, {}!", self.settings.greeting, name)
//!     }
//! }
//! impl Component for PoliteGreeter {
//!     fn describe() -> TypeDescriptor<Self> {
//!         TypeDescriptor::new()
//!             .initializer(|settings: Arc<Settings>| PoliteGreeter { settings })
//!             .implements::<dyn Greeter>(|it| it)
//!     }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_singleton::<Settings>().unwrap().as_self();
//! builder.register_scoped::<PoliteGreeter>().unwrap().as_service::<dyn Greeter>().unwrap();
//! let container = builder.build();
//!
//! let request = container.begin_scope().unwrap();
//! let greeter = request.resolve::<Arc<dyn Greeter>>().unwrap();
//! assert_eq!(greeter.greet("Ada"), "Hello, Ada!");
//! request.dispose();
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once in the root scope and shared by every scope
//! - **Scoped**: created once per scope; each child scope gets its own
//! - **Transient**: created fresh on every resolution
//!
//! Disposable instances are disposed by the scope that constructed them, in
//! reverse order of construction, when that scope is disposed.

// Module declarations
pub mod ambient;
pub mod collection;
pub mod descriptor;
pub mod descriptors;
pub mod error;
pub mod fallback;
pub mod generic;
pub mod key;
pub mod lifetime;
pub mod logger;
pub mod provider;
pub mod resolvable;
pub mod traits;
pub mod wrappers;

// Internal modules
mod internal;
mod registration;

// Re-export core types
pub use collection::{ContainerBuilder, ContainerModule, RegistrationBuilder};
pub use descriptor::{Callable, Component, ComponentInfo, Params, TypeDescriptor};
pub use descriptors::ServiceDescriptor;
pub use error::{DiError, DiResult};
pub use fallback::{FallbackContext, FallbackResolver, Nomination};
pub use generic::{OpenGeneric, Shape};
pub use key::Key;
pub use lifetime::Lifetime;
pub use logger::{Logger, TracingLogger};
pub use provider::{Container, Resolved, Scope};
pub use registration::AnyArc;
pub use resolvable::Resolvable;
pub use traits::{Dispose, Initialize, Resolver, ResolverCore};
pub use wrappers::{Lazy, Owned, Supplier};
