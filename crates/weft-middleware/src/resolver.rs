//! The middleware factory resolver.
//!
//! Registration hands the resolver a [`Middleware`] and its extra arguments.
//! The resolver classifies it once into a [`MiddlewareKind`] and produces a
//! [`MiddlewareEntry`]: the shape the middleware needs for its next stage,
//! an adapter that turns a next-stage value into this middleware's own value,
//! and the captured extra arguments.
//!
//! Patterns are tried in a fixed priority order, first match wins:
//!
//! 1. plain callable (only when no extra arguments were supplied)
//! 2. init/invoke object
//! 3. generator object
//! 4. constructible type

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use weft_core::{Arg, Binding, Operation, PipelineError, PipelineResult, Shape, Value};

use crate::component::{Component, Middleware, TypeDescriptor};

/// The authoring pattern a middleware was classified as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MiddlewareKind {
    /// A function from the next stage to this stage.
    Callable,
    /// An object initialized with the next stage, then invoked.
    InitInvoke,
    /// An object that produces a new stage from the next stage.
    Generator,
    /// A type constructed from the next stage.
    Constructible,
}

impl MiddlewareKind {
    /// Returns the kind's name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Callable => "callable",
            Self::InitInvoke => "init_invoke",
            Self::Generator => "generator",
            Self::Constructible => "constructible",
        }
    }
}

impl fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an entry produces its stage from the next stage.
#[derive(Clone)]
enum Adapter {
    /// Invoke the operation and use its result.
    Produce(Operation),
    /// Invoke the initializer, then use the object itself.
    Initialize { operation: Operation, object: Value },
    /// Invoke the constructor, then attach the type's entry points.
    Construct {
        operation: Operation,
        bindings: Vec<Binding>,
    },
}

/// A normalized middleware registration.
#[derive(Clone)]
pub struct MiddlewareEntry {
    kind: MiddlewareKind,
    type_name: &'static str,
    required_next: Shape,
    adapter: Adapter,
    extra_args: Arc<[Arg]>,
}

impl MiddlewareEntry {
    /// The authoring pattern this entry was classified as.
    #[must_use]
    pub fn kind(&self) -> MiddlewareKind {
        self.kind
    }

    /// The middleware's type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The shape the next stage must have before it is handed to the adapter.
    #[must_use]
    pub fn required_next(&self) -> Shape {
        self.required_next
    }

    /// The captured extra arguments.
    #[must_use]
    pub fn extra_args(&self) -> &[Arg] {
        &self.extra_args
    }

    /// Produces this middleware's stage from `next`.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation, typically
    /// [`PipelineError::ArgumentMismatch`] when `next` is absent but the
    /// middleware does not accept absence.
    pub fn apply(&self, next: Option<Value>) -> PipelineResult<Value> {
        let mut args = Vec::with_capacity(self.extra_args.len() + 1);
        args.push(Arg::from(next));
        args.extend(self.extra_args.iter().cloned());

        match &self.adapter {
            Adapter::Produce(operation) => operation.invoke(&args),
            Adapter::Initialize { operation, object } => {
                operation.invoke(&args)?;
                Ok(object.clone())
            }
            Adapter::Construct {
                operation,
                bindings,
            } => Ok(operation.invoke(&args)?.with_bindings(bindings.iter().cloned())),
        }
    }
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("required_next", &self.required_next)
            .field("extra_args", &self.extra_args.len())
            .finish()
    }
}

/// Classifies `middleware` and normalizes it into an entry.
///
/// # Errors
///
/// - [`PipelineError::MissingMiddleware`] if `middleware` is absent
/// - [`PipelineError::UnsupportedMiddlewareShape`] if an object matches none
///   of the object patterns
/// - [`PipelineError::NoMatchingConstructor`] if a type has no constructor
///   for the supplied extra arguments
pub fn resolve(
    middleware: Option<Middleware>,
    extra_args: Vec<Arg>,
) -> PipelineResult<MiddlewareEntry> {
    let middleware = middleware.ok_or(PipelineError::MissingMiddleware)?;
    let type_name = middleware.type_name();

    let (kind, adapter) = match middleware {
        Middleware::Object(component) => classify_object(&component, &extra_args)
            .ok_or_else(|| PipelineError::unsupported_shape(type_name))?,
        Middleware::Type(descriptor) => classify_type(&descriptor, &extra_args).ok_or_else(|| {
            PipelineError::no_matching_constructor(type_name, extra_args.len())
        })?,
    };

    let required_next = match &adapter {
        Adapter::Produce(operation)
        | Adapter::Initialize { operation, .. }
        | Adapter::Construct { operation, .. } => operation
            .params()
            .first()
            .map_or_else(Shape::any, |param| param.shape()),
    };

    debug!(
        kind = %kind,
        middleware = type_name,
        next = %required_next,
        extra_args = extra_args.len(),
        "resolved middleware"
    );

    Ok(MiddlewareEntry {
        kind,
        type_name,
        required_next,
        adapter,
        extra_args: extra_args.into(),
    })
}

fn classify_object(
    component: &Component,
    extra_args: &[Arg],
) -> Option<(MiddlewareKind, Adapter)> {
    if extra_args.is_empty() {
        if let Some(call) = component.callable().filter(|call| call.arity() == 1) {
            return Some((MiddlewareKind::Callable, Adapter::Produce(call.clone())));
        }
    }

    if let Some(init) = find_trailing(component.initializers(), extra_args) {
        return Some((
            MiddlewareKind::InitInvoke,
            Adapter::Initialize {
                operation: init.clone(),
                object: component.value().clone(),
            },
        ));
    }

    find_trailing(component.generators(), extra_args)
        .map(|generate| (MiddlewareKind::Generator, Adapter::Produce(generate.clone())))
}

fn classify_type(
    descriptor: &TypeDescriptor,
    extra_args: &[Arg],
) -> Option<(MiddlewareKind, Adapter)> {
    find_trailing(descriptor.constructors(), extra_args).map(|construct| {
        (
            MiddlewareKind::Constructible,
            Adapter::Construct {
                operation: construct.clone(),
                bindings: descriptor.bindings().to_vec(),
            },
        )
    })
}

fn find_trailing<'a>(operations: &'a [Operation], extra_args: &[Arg]) -> Option<&'a Operation> {
    operations
        .iter()
        .find(|operation| operation.accepts_trailing(extra_args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Construct, Generate, Initialize};
    use parking_lot::Mutex;
    use weft_core::EntryPoint;

    type Stage = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

    #[derive(Default)]
    struct Offset {
        next: Mutex<Option<Stage>>,
        by: Mutex<u32>,
    }

    impl Initialize<Stage, (u32,)> for Offset {
        fn initialize(&self, next: Stage, (by,): (u32,)) {
            *self.next.lock() = Some(next);
            *self.by.lock() = by;
        }
    }

    impl Generate<Stage, (u32,)> for Offset {
        type Output = Stage;

        fn generate(&self, next: Stage, (by,): (u32,)) -> Stage {
            Arc::new(move |n: u32| next(n) * by)
        }
    }

    impl EntryPoint<Stage> for Offset {
        fn entry_point(self: Arc<Self>) -> Stage {
            Arc::new(move |n: u32| {
                let next = self.next.lock().clone();
                let by = *self.by.lock();
                next.map_or(n, |next| next(n + by))
            })
        }
    }

    struct Scaled {
        next: Stage,
        factor: u32,
    }

    impl Construct<Stage, (u32, u32)> for Scaled {
        fn construct(next: Stage, (factor, _unused): (u32, u32)) -> Self {
            Self { next, factor }
        }
    }

    impl EntryPoint<Stage> for Scaled {
        fn entry_point(self: Arc<Self>) -> Stage {
            Arc::new(move |n: u32| (self.next)(n * self.factor))
        }
    }

    fn identity() -> Stage {
        Arc::new(|n: u32| n)
    }

    fn offset_component() -> Component {
        Component::builder(Arc::new(Offset::default()))
            .callable(|next: Stage| -> Stage { Arc::new(move |n: u32| next(n) + 1000) })
            .initializer::<Stage, (u32,)>()
            .generator::<Stage, (u32,)>()
            .exposing::<Stage>()
            .build()
    }

    #[test]
    fn test_absent_middleware_is_rejected() {
        let err = resolve(None, Vec::new()).unwrap_err();
        assert_eq!(err, PipelineError::MissingMiddleware);
    }

    #[test]
    fn test_callable_wins_without_extra_args() {
        let entry = resolve(Some(offset_component().into()), Vec::new()).unwrap();
        assert_eq!(entry.kind(), MiddlewareKind::Callable);
        assert_eq!(entry.required_next(), Shape::of::<Stage>());

        let stage = entry.apply(Some(Value::new(identity()))).unwrap();
        assert_eq!(stage.downcast_ref::<Stage>().unwrap()(1), 1001);
    }

    #[test]
    fn test_extra_args_skip_callable_for_initializer() {
        let entry = resolve(Some(offset_component().into()), vec![Arg::new(5_u32)]).unwrap();
        assert_eq!(entry.kind(), MiddlewareKind::InitInvoke);
        assert_eq!(entry.extra_args().len(), 1);

        let object = entry.apply(Some(Value::new(identity()))).unwrap();
        assert_eq!(object.shape(), Shape::of::<Offset>());
        let bound = object.bind_entry_point(Shape::of::<Stage>()).unwrap();
        assert_eq!(bound.downcast_ref::<Stage>().unwrap()(1), 6);
    }

    #[test]
    fn test_generator_when_no_initializer_matches() {
        let component = Component::builder(Arc::new(Offset::default()))
            .generator::<Stage, (u32,)>()
            .build();
        let entry = resolve(Some(component.into()), vec![Arg::new(3_u32)]).unwrap();
        assert_eq!(entry.kind(), MiddlewareKind::Generator);

        let stage = entry.apply(Some(Value::new(identity()))).unwrap();
        assert_eq!(stage.downcast_ref::<Stage>().unwrap()(4), 12);
    }

    #[test]
    fn test_object_without_matching_pattern_is_unsupported() {
        let err = resolve(
            Some(offset_component().into()),
            vec![Arg::new(String::from("wrong type"))],
        )
        .unwrap_err();
        match err {
            PipelineError::UnsupportedMiddlewareShape { type_name } => {
                assert!(type_name.ends_with("Offset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constructible_type_attaches_entry_points() {
        let descriptor = TypeDescriptor::builder::<Scaled>()
            .constructor::<Stage, (u32, u32)>()
            .exposing::<Stage>()
            .build();
        let entry = resolve(
            Some(descriptor.into()),
            vec![Arg::new(3_u32), Arg::new(0_u32)],
        )
        .unwrap();
        assert_eq!(entry.kind(), MiddlewareKind::Constructible);

        let object = entry.apply(Some(Value::new(identity()))).unwrap();
        let bound = object.bind_entry_point(Shape::of::<Stage>()).unwrap();
        assert_eq!(bound.downcast_ref::<Stage>().unwrap()(2), 6);
    }

    #[test]
    fn test_constructor_arity_mismatch() {
        let descriptor = TypeDescriptor::builder::<Scaled>()
            .constructor::<Stage, (u32, u32)>()
            .build();
        let err = resolve(Some(descriptor.into()), vec![Arg::new(3_u32)]).unwrap_err();
        match err {
            PipelineError::NoMatchingConstructor {
                type_name,
                extra_args,
            } => {
                assert!(type_name.ends_with("Scaled"));
                assert_eq!(extra_args, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
