//! The signature conversion registry.
//!
//! A conversion turns a value of one shape (its input) into a value of another
//! shape (its output). Conversions are keyed by `(output, input)`; registering
//! the same key twice replaces the earlier conversion but keeps its position,
//! so iteration order is registration order of first appearance.
//!
//! The registry is a cheap, cloneable handle. Middleware can capture a clone,
//! or declare a `ConversionRegistry` parameter and receive one as an extra
//! registration argument, then register conversions late, even while the
//! pipeline is being composed.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;
use weft_core::{Arg, Argument, Operation, Param, PipelineError, PipelineResult, Shape, Value};

/// A registered conversion edge.
#[derive(Clone, Debug)]
pub struct Conversion {
    output: Shape,
    input: Shape,
    operation: Operation,
}

impl Conversion {
    /// The shape this conversion produces.
    #[must_use]
    pub fn output(&self) -> Shape {
        self.output
    }

    /// The shape this conversion consumes.
    #[must_use]
    pub fn input(&self) -> Shape {
        self.input
    }

    /// Applies the conversion to `value`.
    pub fn apply(&self, value: Value) -> PipelineResult<Value> {
        self.operation.invoke(&[Arg::Present(value)])
    }
}

/// Conversion edges keyed by `(output, input)`.
///
/// # Example
///
/// ```
/// use weft_core::Shape;
/// use weft_middleware::ConversionRegistry;
///
/// let registry = ConversionRegistry::new();
/// registry.add(|n: u32| n.to_string());
///
/// let edge = registry.lookup(Shape::of::<String>(), Shape::of::<u32>()).unwrap();
/// assert_eq!(edge.output(), Shape::of::<String>());
/// ```
#[derive(Clone, Default)]
pub struct ConversionRegistry {
    edges: Arc<RwLock<IndexMap<(Shape, Shape), Conversion>>>,
}

impl ConversionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a conversion operation.
    ///
    /// The key is `(operation output, first parameter shape)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if `conversion` is absent or
    /// does not take exactly one parameter.
    pub fn register(&self, conversion: Option<Operation>) -> PipelineResult<()> {
        let operation = conversion.ok_or_else(|| {
            PipelineError::invalid_argument("conversion", "conversion function must not be absent")
        })?;
        if operation.arity() != 1 {
            return Err(PipelineError::invalid_argument(
                "conversion",
                format!(
                    "`{}` takes {} parameters, conversions must take exactly one",
                    operation.name(),
                    operation.arity()
                ),
            ));
        }

        let input = operation.params()[0].shape();
        self.insert(Conversion {
            output: operation.output(),
            input,
            operation,
        });
        Ok(())
    }

    /// Registers a typed conversion from `I` to `O`.
    pub fn add<I, O, F>(&self, f: F)
    where
        I: Argument,
        O: Any + Send + Sync,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        let operation = Operation::new("conversion", move |(input,): (I,)| f(input));
        self.insert(Conversion {
            output: operation.output(),
            input: I::param().shape(),
            operation,
        });
    }

    fn insert(&self, conversion: Conversion) {
        let (output, input) = (conversion.output, conversion.input);
        let replaced = self
            .edges
            .write()
            .insert((output, input), conversion)
            .is_some();
        debug!(
            output = %output,
            input = %input,
            replaced,
            "registered signature conversion"
        );
    }

    /// Returns the conversion registered for `(output, input)`.
    #[must_use]
    pub fn lookup(&self, output: Shape, input: Shape) -> Option<Conversion> {
        self.edges.read().get(&(output, input)).cloned()
    }

    /// Returns every conversion in registration order.
    ///
    /// The returned list is a snapshot; conversions registered afterwards
    /// are not included.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Conversion> {
        self.edges.read().values().cloned().collect()
    }

    /// Number of registered conversions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    /// Returns `true` if no conversions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }
}

impl Argument for ConversionRegistry {
    fn param() -> Param {
        Param::required(Shape::of::<Self>())
    }

    fn extract(arg: &Arg) -> Option<Self> {
        arg.value()?.downcast_ref::<Self>().cloned()
    }
}

impl std::fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.edges.read().keys()).finish()
    }
}
