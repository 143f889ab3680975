//! Dynamically invocable operations.
//!
//! An [`Operation`] is a named function with a declared parameter list and an
//! output shape. Initializers, generators, constructors, plain middleware
//! callables, and signature conversions are all stored as operations so that
//! the resolver and the conversion engine can inspect their arity and
//! parameter shapes before calling them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::args::{params_accept, Arg, Args, Param};
use crate::error::{PipelineError, PipelineResult};
use crate::shape::Shape;
use crate::value::Value;

type OperationBody = dyn Fn(&[Arg]) -> PipelineResult<Value> + Send + Sync;

/// A named function with declared parameters.
///
/// # Example
///
/// ```
/// use weft_core::{Arg, Operation, Shape};
///
/// let double = Operation::new("double", |(n,): (u32,)| n * 2);
/// assert_eq!(double.arity(), 1);
/// assert_eq!(double.output(), Shape::of::<u32>());
///
/// let result = double.invoke(&[Arg::new(21_u32)]).unwrap();
/// assert_eq!(result.downcast_ref::<u32>(), Some(&42));
/// ```
#[derive(Clone)]
pub struct Operation {
    name: &'static str,
    params: Arc<[Param]>,
    output: Shape,
    body: Arc<OperationBody>,
}

impl Operation {
    /// Creates an operation from a typed function.
    ///
    /// The parameter list is derived from `A`.
    pub fn new<A, O, F>(name: &'static str, f: F) -> Self
    where
        A: Args,
        O: Any + Send + Sync,
        F: Fn(A) -> O + Send + Sync + 'static,
    {
        Self::try_new(name, move |args: A| Ok(f(args)))
    }

    /// Creates an operation from a typed function that may fail.
    pub fn try_new<A, O, F>(name: &'static str, f: F) -> Self
    where
        A: Args,
        O: Any + Send + Sync,
        F: Fn(A) -> PipelineResult<O> + Send + Sync + 'static,
    {
        let body = move |args: &[Arg]| {
            let Some(typed) = A::extract(args) else {
                debug!(operation = name, received = args.len(), "argument mismatch");
                return Err(PipelineError::argument_mismatch(name, args.len()));
            };
            f(typed).map(Value::new)
        };
        Self {
            name,
            params: A::params().into(),
            output: Shape::of::<O>(),
            body: Arc::new(body),
        }
    }

    /// Creates an operation from an explicit parameter list.
    ///
    /// Used by hosts that assemble operations at runtime. The body receives
    /// the raw arguments; nothing checks them against `params` before the
    /// call except [`accepts`](Self::accepts).
    pub fn from_parts<F>(name: &'static str, params: Vec<Param>, output: Shape, body: F) -> Self
    where
        F: Fn(&[Arg]) -> PipelineResult<Value> + Send + Sync + 'static,
    {
        Self {
            name,
            params: params.into(),
            output,
            body: Arc::new(body),
        }
    }

    /// The operation name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The declared output shape.
    #[must_use]
    pub fn output(&self) -> Shape {
        self.output
    }

    /// Returns `true` if `args` match the declared parameters exactly.
    #[must_use]
    pub fn accepts(&self, args: &[Arg]) -> bool {
        params_accept(&self.params, args)
    }

    /// Returns `true` if the operation takes a leading "next" parameter
    /// followed by parameters matching `extra`.
    #[must_use]
    pub fn accepts_trailing(&self, extra: &[Arg]) -> bool {
        self.params.len() == extra.len() + 1 && params_accept(&self.params[1..], extra)
    }

    /// Invokes the operation.
    pub fn invoke(&self, args: &[Arg]) -> PipelineResult<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("output", &self.output)
            .finish()
    }
}
