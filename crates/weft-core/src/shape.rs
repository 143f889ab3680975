//! Callable and value shapes.
//!
//! A [`Shape`] is the runtime descriptor of a Rust type: the contract a value
//! must satisfy before it can be handed to a stage that expects it. Rust has
//! no subtyping between concrete types, so two shapes are compatible only when
//! they name the same type, or when the target is the universal shape.

use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Runtime descriptor of a value's type.
///
/// # Example
///
/// ```
/// use weft_core::Shape;
///
/// let text = Shape::of::<String>();
/// assert!(text.accepts(Shape::of::<String>()));
/// assert!(!text.accepts(Shape::of::<u32>()));
/// assert!(Shape::any().accepts(text));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    /// `None` for the universal shape.
    id: Option<TypeId>,
    name: &'static str,
}

impl Shape {
    /// Returns the shape of `T`.
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: Some(TypeId::of::<T>()),
            name: type_name::<T>(),
        }
    }

    /// Returns the universal shape, which every value satisfies.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            id: None,
            name: "any",
        }
    }

    /// Returns `true` if this is the universal shape.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.id.is_none()
    }

    /// Returns the type name this shape describes.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if a value of shape `other` can be used where `self`
    /// is expected.
    #[must_use]
    pub fn accepts(&self, other: Shape) -> bool {
        match self.id {
            None => true,
            Some(id) => other.id == Some(id),
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({})", self.name)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
