//! Type-erased pipeline values.
//!
//! Everything that moves through composition (terminals, middleware objects,
//! produced callables, construction arguments) travels as a [`Value`]. A value
//! remembers its runtime [`Shape`] and may carry entry-point bindings that let
//! the conversion engine bind the object as a callable of another shape.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::shape::Shape;

/// An object whose invocation entry point can stand in for a callable of
/// shape `S`.
///
/// This is the explicit form of "the object has an `invoke` method that is
/// compatible with the target signature". Declare it on a component with
/// `exposing::<S>()` so the conversion engine can find it.
pub trait EntryPoint<S>: Send + Sync + 'static {
    /// Binds this object's entry point as a callable of shape `S`.
    fn entry_point(self: Arc<Self>) -> S;
}

type BindFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

/// A declared entry point: the callable shape it produces and how to bind it.
#[derive(Clone)]
pub struct Binding {
    shape: Shape,
    bind: Arc<BindFn>,
}

impl Binding {
    /// Creates the binding for `T`'s entry point of shape `S`.
    #[must_use]
    pub fn entry_point<T, S>() -> Self
    where
        T: EntryPoint<S>,
        S: Any + Send + Sync,
    {
        Self {
            shape: Shape::of::<S>(),
            bind: Arc::new(|value: &Value| {
                value
                    .downcast_arc::<T>()
                    .map(|object| Value::new(object.entry_point()))
            }),
        }
    }

    /// Returns the callable shape this binding produces.
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }
}

type HandleFn = dyn Fn(&Arc<dyn Any + Send + Sync>) -> Option<Value> + Send + Sync;

// The `Arc<T>` view of a shared object.
#[derive(Clone)]
struct Handle {
    shape: Shape,
    make: Arc<HandleFn>,
}

impl Handle {
    fn of<T: Any + Send + Sync>() -> Self {
        Self {
            shape: Shape::of::<Arc<T>>(),
            make: Arc::new(|inner: &Arc<dyn Any + Send + Sync>| {
                Arc::clone(inner).downcast::<T>().ok().map(Value::new)
            }),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("shape", &self.shape).finish()
    }
}

/// A cloneable, type-erased value with a runtime shape.
///
/// # Example
///
/// ```
/// use weft_core::{Shape, Value};
///
/// let value = Value::new(42_u32);
/// assert_eq!(value.shape(), Shape::of::<u32>());
/// assert_eq!(value.downcast_ref::<u32>(), Some(&42));
/// ```
#[derive(Clone)]
pub struct Value {
    shape: Shape,
    inner: Arc<dyn Any + Send + Sync>,
    handle: Option<Handle>,
    bindings: Vec<Binding>,
}

impl Value {
    /// Wraps `value`.
    ///
    /// Wrapping a `Value` returns it unchanged instead of nesting it.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        match boxed.downcast::<Value>() {
            Ok(value) => *value,
            Err(boxed) => Self {
                shape: Shape::of::<T>(),
                inner: Arc::from(boxed),
                handle: None,
                bindings: Vec::new(),
            },
        }
    }

    /// Wraps a shared object without re-allocating it.
    ///
    /// The value's shape is `T`, and it also satisfies `Arc<T>`: a stage or
    /// conversion that takes `Arc<T>` receives the same allocation, as does
    /// [`downcast_arc`](Self::downcast_arc).
    pub fn object<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self {
            shape: Shape::of::<T>(),
            inner: object,
            handle: Some(Handle::of::<T>()),
            bindings: Vec::new(),
        }
    }

    /// Attaches an entry-point binding.
    #[must_use]
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Attaches several entry-point bindings, keeping declaration order.
    #[must_use]
    pub fn with_bindings(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Returns the runtime shape.
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Returns the runtime type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.shape.name()
    }

    /// Returns `true` if this value can stand where `target` is expected,
    /// either directly or through its `Arc<T>` view.
    #[must_use]
    pub fn satisfies(&self, target: Shape) -> bool {
        target.accepts(self.shape)
            || self
                .handle
                .as_ref()
                .is_some_and(|handle| target.accepts(handle.shape))
    }

    /// Returns this value as seen by a consumer of `target`.
    ///
    /// That is the value itself when `target` accepts its shape, and the
    /// `Arc<T>` view of a shared object when `target` is `Arc<T>`.
    #[must_use]
    pub fn view(&self, target: Shape) -> Option<Value> {
        if target.accepts(self.shape) {
            return Some(self.clone());
        }
        let handle = self
            .handle
            .as_ref()
            .filter(|handle| target.accepts(handle.shape))?;
        (handle.make)(&self.inner)
    }

    /// Returns the declared entry-point bindings.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Borrows the inner value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns the inner allocation as `Arc<T>`.
    ///
    /// A value that wraps an `Arc<T>` itself yields a clone of that handle.
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        if let Some(handle) = self.inner.downcast_ref::<Arc<T>>() {
            return Some(Arc::clone(handle));
        }
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Binds the first declared entry point whose shape `target` accepts.
    ///
    /// Bindings are tried in declaration order.
    #[must_use]
    pub fn bind_entry_point(&self, target: Shape) -> Option<Value> {
        self.bindings
            .iter()
            .filter(|binding| target.accepts(binding.shape))
            .find_map(|binding| (binding.bind)(self))
    }

    /// Returns `true` if both values share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("shape", &self.shape)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
