//! Middleware authoring styles.
//!
//! weft accepts middleware written in four styles. Each style is expressed as
//! an explicit capability that the author declares when wrapping the object:
//!
//! | Style | Capability | Declared with |
//! |-------|------------|---------------|
//! | Plain callable | `Fn(N) -> P` | [`Component::from_fn`], [`ComponentBuilder::callable`] |
//! | Init/invoke object | [`Initialize`] + an entry point | [`ComponentBuilder::initializer`], [`ComponentBuilder::exposing`] |
//! | Generator object | [`Generate`] | [`ComponentBuilder::generator`] |
//! | Constructible type | [`Construct`] | [`TypeDescriptor::builder`], [`TypeDescriptorBuilder::constructor`] |
//!
//! `N` is always the shape of the "next" stage the middleware wraps, and `A`
//! is the tuple of extra arguments supplied at registration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use http::StatusCode;
//! use weft_core::{AppFunc, BoxFuture, Environment, Invoke};
//! use weft_middleware::{Component, Initialize};
//! use parking_lot::RwLock;
//!
//! #[derive(Default)]
//! struct RequireHeader {
//!     next: RwLock<Option<AppFunc>>,
//!     header: RwLock<String>,
//! }
//!
//! impl Initialize<AppFunc, (String,)> for RequireHeader {
//!     fn initialize(&self, next: AppFunc, (header,): (String,)) {
//!         *self.next.write() = Some(next);
//!         *self.header.write() = header;
//!     }
//! }
//!
//! impl Invoke for RequireHeader {
//!     fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
//!         Box::pin(async move {
//!             let header = self.header.read().clone();
//!             let next = self.next.read().clone();
//!             match next {
//!                 Some(next) if env.request_header(&header).is_some() => next(env).await,
//!                 _ => env.set_response_status(StatusCode::BAD_REQUEST),
//!             }
//!         })
//!     }
//! }
//!
//! let component = Component::builder(Arc::new(RequireHeader::default()))
//!     .initializer::<AppFunc, (String,)>()
//!     .exposing::<AppFunc>()
//!     .build();
//! assert!(component.type_name().ends_with("RequireHeader"));
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use weft_core::{
    Arg, Args, Argument, Binding, EntryPoint, Operation, Param, PipelineError, Shape, Value,
};

/// An object initialized with the next stage, then invoked through its entry
/// point.
///
/// `initialize` may run more than once if the pipeline is built repeatedly;
/// implementors keep the most recent `next`.
pub trait Initialize<N: Argument, A: Args = ()>: Send + Sync + 'static {
    /// Receives the next stage and the extra registration arguments.
    fn initialize(&self, next: N, args: A);
}

/// An object that produces a new stage from the next stage.
pub trait Generate<N: Argument, A: Args = ()>: Send + Sync + 'static {
    /// The produced stage.
    type Output: Any + Send + Sync;

    /// Wraps `next`, returning the new stage.
    fn generate(&self, next: N, args: A) -> Self::Output;
}

/// A type constructed from the next stage.
pub trait Construct<N: Argument, A: Args = ()>: Sized + Send + Sync + 'static {
    /// Builds a new instance wrapping `next`.
    fn construct(next: N, args: A) -> Self;
}

/// A middleware object together with its declared capabilities.
#[derive(Clone)]
pub struct Component {
    value: Value,
    type_name: &'static str,
    callable: Option<Operation>,
    initializers: Vec<Operation>,
    generators: Vec<Operation>,
}

impl Component {
    /// Starts describing `object`.
    pub fn builder<T: Any + Send + Sync>(object: Arc<T>) -> ComponentBuilder<T> {
        ComponentBuilder {
            object,
            bindings: Vec::new(),
            callable: None,
            initializers: Vec::new(),
            generators: Vec::new(),
        }
    }

    /// Wraps a plain callable: a function that receives the next stage and
    /// returns this stage.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_core::{app_func, AppFunc};
    /// use weft_middleware::Component;
    ///
    /// let passthrough = Component::from_fn(|next: AppFunc| -> AppFunc {
    ///     app_func(move |env| next(env))
    /// });
    /// assert!(passthrough.callable().is_some());
    /// ```
    pub fn from_fn<N, P, F>(f: F) -> Self
    where
        N: Argument,
        P: Any + Send + Sync,
        F: Fn(N) -> P + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let call = Arc::clone(&f);
        Component::builder(f)
            .callable(move |next: N| call(next))
            .build()
    }

    /// The wrapped object.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The wrapped object's type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The plain-callable view, if declared.
    #[must_use]
    pub fn callable(&self) -> Option<&Operation> {
        self.callable.as_ref()
    }

    /// Declared initializer overloads, in declaration order.
    #[must_use]
    pub fn initializers(&self) -> &[Operation] {
        &self.initializers
    }

    /// Declared generator overloads, in declaration order.
    #[must_use]
    pub fn generators(&self) -> &[Operation] {
        &self.generators
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type_name", &self.type_name)
            .field("callable", &self.callable.is_some())
            .field("initializers", &self.initializers.len())
            .field("generators", &self.generators.len())
            .finish()
    }
}

/// Builder for [`Component`].
pub struct ComponentBuilder<T> {
    object: Arc<T>,
    bindings: Vec<Binding>,
    callable: Option<Operation>,
    initializers: Vec<Operation>,
    generators: Vec<Operation>,
}

impl<T: Any + Send + Sync> ComponentBuilder<T> {
    /// Declares a plain-callable view of the object.
    #[must_use]
    pub fn callable<N, P, F>(mut self, f: F) -> Self
    where
        N: Argument,
        P: Any + Send + Sync,
        F: Fn(N) -> P + Send + Sync + 'static,
    {
        self.callable = Some(Operation::new("call", move |(next,): (N,)| f(next)));
        self
    }

    /// Declares an [`Initialize`] overload.
    #[must_use]
    pub fn initializer<N, A>(mut self) -> Self
    where
        N: Argument,
        A: Args,
        T: Initialize<N, A>,
    {
        let object = Arc::clone(&self.object);
        self.initializers.push(Operation::new(
            "initialize",
            move |staged: Staged<N, A>| object.initialize(staged.next, staged.args),
        ));
        self
    }

    /// Declares a [`Generate`] overload.
    #[must_use]
    pub fn generator<N, A>(mut self) -> Self
    where
        N: Argument,
        A: Args,
        T: Generate<N, A>,
    {
        let object = Arc::clone(&self.object);
        self.generators.push(Operation::new(
            "generate",
            move |staged: Staged<N, A>| object.generate(staged.next, staged.args),
        ));
        self
    }

    /// Declares an entry point the object can be bound as.
    #[must_use]
    pub fn exposing<S>(mut self) -> Self
    where
        S: Any + Send + Sync,
        T: EntryPoint<S>,
    {
        self.bindings.push(Binding::entry_point::<T, S>());
        self
    }

    /// Finishes the description.
    #[must_use]
    pub fn build(self) -> Component {
        Component {
            value: Value::object(self.object).with_bindings(self.bindings),
            type_name: type_name::<T>(),
            callable: self.callable,
            initializers: self.initializers,
            generators: self.generators,
        }
    }
}

/// A constructible middleware type.
#[derive(Clone)]
pub struct TypeDescriptor {
    type_name: &'static str,
    constructors: Vec<Operation>,
    bindings: Vec<Binding>,
}

impl TypeDescriptor {
    /// Starts describing `T`.
    #[must_use]
    pub fn builder<T: Any + Send + Sync>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            constructors: Vec::new(),
            bindings: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The described type's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declared constructors, in declaration order.
    #[must_use]
    pub fn constructors(&self) -> &[Operation] {
        &self.constructors
    }

    /// Entry points of constructed instances.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Builder for [`TypeDescriptor`].
pub struct TypeDescriptorBuilder<T> {
    constructors: Vec<Operation>,
    bindings: Vec<Binding>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    /// Declares a [`Construct`] overload.
    #[must_use]
    pub fn constructor<N, A>(mut self) -> Self
    where
        N: Argument,
        A: Args,
        T: Construct<N, A>,
    {
        let name = "construct";
        self.constructors.push(Operation::from_parts(
            name,
            Staged::<N, A>::params(),
            Shape::of::<T>(),
            move |args: &[Arg]| {
                let staged = Staged::<N, A>::extract(args)
                    .ok_or_else(|| PipelineError::argument_mismatch(name, args.len()))?;
                Ok(Value::object(Arc::new(T::construct(staged.next, staged.args))))
            },
        ));
        self
    }

    /// Declares an entry point constructed instances can be bound as.
    #[must_use]
    pub fn exposing<S>(mut self) -> Self
    where
        S: Any + Send + Sync,
        T: EntryPoint<S>,
    {
        self.bindings.push(Binding::entry_point::<T, S>());
        self
    }

    /// Finishes the description.
    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            type_name: type_name::<T>(),
            constructors: self.constructors,
            bindings: self.bindings,
        }
    }
}

/// Arguments of a capability call: the next stage followed by the extra
/// registration arguments.
struct Staged<N, A> {
    next: N,
    args: A,
}

impl<N: Argument, A: Args> Args for Staged<N, A> {
    fn params() -> Vec<Param> {
        let mut params = vec![N::param()];
        params.extend(A::params());
        params
    }

    fn extract(args: &[Arg]) -> Option<Self> {
        let (first, rest) = args.split_first()?;
        Some(Self {
            next: N::extract(first)?,
            args: A::extract(rest)?,
        })
    }
}

/// A middleware object passed to registration.
#[derive(Clone, Debug)]
pub enum Middleware {
    /// An object instance.
    Object(Component),
    /// A constructible type.
    Type(TypeDescriptor),
}

impl Middleware {
    /// Wraps a plain callable; see [`Component::from_fn`].
    pub fn from_fn<N, P, F>(f: F) -> Self
    where
        N: Argument,
        P: Any + Send + Sync,
        F: Fn(N) -> P + Send + Sync + 'static,
    {
        Self::Object(Component::from_fn(f))
    }

    /// The runtime type name of the middleware.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Object(component) => component.type_name(),
            Self::Type(descriptor) => descriptor.type_name(),
        }
    }
}

impl From<Component> for Middleware {
    fn from(component: Component) -> Self {
        Self::Object(component)
    }
}

impl From<TypeDescriptor> for Middleware {
    fn from(descriptor: TypeDescriptor) -> Self {
        Self::Type(descriptor)
    }
}

impl<T: Any + Send + Sync> From<ComponentBuilder<T>> for Middleware {
    fn from(builder: ComponentBuilder<T>) -> Self {
        Self::Object(builder.build())
    }
}

impl<T: Any + Send + Sync> From<TypeDescriptorBuilder<T>> for Middleware {
    fn from(builder: TypeDescriptorBuilder<T>) -> Self {
        Self::Type(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Initialize<u32, (String,)> for Recorder {
        fn initialize(&self, next: u32, (label,): (String,)) {
            self.seen.lock().push(format!("{label}:{next}"));
        }
    }

    impl Generate<u32> for Recorder {
        type Output = u64;

        fn generate(&self, next: u32, (): ()) -> u64 {
            u64::from(next) * 2
        }
    }

    struct Doubler {
        next: u32,
        factor: u32,
    }

    impl Construct<u32, (u32,)> for Doubler {
        fn construct(next: u32, (factor,): (u32,)) -> Self {
            Self { next, factor }
        }
    }

    #[test]
    fn test_initializer_declares_next_then_extra_params() {
        let recorder = Arc::new(Recorder::default());
        let component = Component::builder(Arc::clone(&recorder))
            .initializer::<u32, (String,)>()
            .build();

        let init = &component.initializers()[0];
        assert_eq!(init.arity(), 2);
        assert_eq!(init.params()[0].shape(), Shape::of::<u32>());
        assert!(init.accepts_trailing(&[Arg::new(String::from("a"))]));

        init.invoke(&[Arg::new(7_u32), Arg::new(String::from("a"))])
            .unwrap();
        assert_eq!(*recorder.seen.lock(), vec!["a:7".to_owned()]);
    }

    #[test]
    fn test_generator_returns_new_stage() {
        let component = Component::builder(Arc::new(Recorder::default()))
            .generator::<u32, ()>()
            .build();
        let generate = &component.generators()[0];
        assert_eq!(generate.arity(), 1);
        assert_eq!(generate.output(), Shape::of::<u64>());

        let produced = generate.invoke(&[Arg::new(21_u32)]).unwrap();
        assert_eq!(produced.downcast_ref::<u64>(), Some(&42));
    }

    #[test]
    fn test_constructor_builds_shared_instance() {
        let descriptor = TypeDescriptor::builder::<Doubler>()
            .constructor::<u32, (u32,)>()
            .build();
        assert!(descriptor.type_name().ends_with("Doubler"));

        let construct = &descriptor.constructors()[0];
        let value = construct
            .invoke(&[Arg::new(5_u32), Arg::new(3_u32)])
            .unwrap();
        assert_eq!(value.shape(), Shape::of::<Doubler>());
        let doubler = value.downcast_arc::<Doubler>().unwrap();
        assert_eq!((doubler.next, doubler.factor), (5, 3));
    }

    #[test]
    fn test_from_fn_declares_callable() {
        let component = Component::from_fn(|next: u32| next + 1);
        let call = component.callable().unwrap();
        assert_eq!(call.arity(), 1);
        let out = call.invoke(&[Arg::new(1_u32)]).unwrap();
        assert_eq!(out.downcast_ref::<u32>(), Some(&2));
    }
}
