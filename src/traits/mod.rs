//! Core traits for the dependency injection container.

mod dispose;
mod resolver;

pub use dispose::{Dispose, Initialize};
pub use resolver::{Resolver, ResolverCore};
