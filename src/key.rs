//! Service key types for the dependency injection container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;

/// Key for service storage and lookup.
///
/// Keys identify the type a caller requests. Sized types are concrete
/// (`Key::Type`) and can be constructed directly; unsized types such as
/// `dyn Trait` are pure capabilities (`Key::Trait`) and need a registration
/// or a fallback to be resolved.
///
/// # Examples
///
/// ```rust
/// use lifescope::Key;
///
/// trait Logger: Send + Sync {}
///
/// assert!(Key::of::<String>().is_concrete());
/// assert!(Key::of::<dyn Logger>().is_capability());
/// assert_eq!(Key::of::<u32>().display_name(), "u32");
/// ```
#[derive(Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Capability (trait object) key with TypeId and name for diagnostics
    Trait(TypeId, &'static str),
}

impl Key {
    /// Builds the key of `T`, classifying it by whether `T` is sized.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Key {
        let id = TypeId::of::<T>();
        let name = std::any::type_name::<T>();
        // Pointers to unsized types carry metadata and are wider than thin pointers.
        if size_of::<*const T>() == size_of::<*const ()>() {
            Key::Type(id, name)
        } else {
            Key::Trait(id, name)
        }
    }

    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) | Key::Trait(_, name) => name,
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::Trait(id, _) => *id,
        }
    }

    /// True for sized types the engine may construct without a registration.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Key::Type(..))
    }

    /// True for `dyn Trait` keys.
    pub fn is_capability(&self) -> bool {
        matches!(self, Key::Trait(..))
    }
}

// Keys compare by TypeId only; the name is diagnostic.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(_, name) => write!(f, "Type({})", name),
            Key::Trait(_, name) => write!(f, "Trait({})", name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Capability: Send + Sync {}
    struct Concrete;

    #[test]
    fn classifies_sized_and_unsized_types() {
        assert!(Key::of::<Concrete>().is_concrete());
        assert!(Key::of::<dyn Capability>().is_capability());
        assert!(Key::of::<dyn Capability + Send + Sync>().is_capability());
    }

    #[test]
    fn equality_ignores_kind_names() {
        assert_eq!(Key::of::<Concrete>(), Key::of::<Concrete>());
        assert_ne!(Key::of::<Concrete>(), Key::of::<dyn Capability>());
    }
}
