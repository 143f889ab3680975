//! The conversion engine.
//!
//! [`Converter`] reconciles the shape a stage produced with the shape the next
//! stage requires. The search is bounded:
//!
//! 1. **One hop**: the value already has the target shape (a shared object
//!    also has the `Arc` shape of its type); or one of its
//!    declared entry points binds to the target shape; or a single registered
//!    conversion takes the value's shape to the target shape.
//! 2. **Multi hop**: a registered conversion takes the value (after at most
//!    one hop) to an intermediate shape, and one more hop reaches the target.
//!
//! Candidates are tried in registration order and the first success wins.
//! Deeper chains are never explored, so cycles in the registry cannot loop.
//! This is a first-match heuristic, not a shortest-path search.

use tracing::trace;
use weft_core::{PipelineError, PipelineResult, Shape, Value};

use crate::conversion::{Conversion, ConversionRegistry};

/// Converts values between shapes using a snapshot of a registry.
#[derive(Debug, Clone)]
pub struct Converter {
    edges: Vec<Conversion>,
}

impl Converter {
    /// Creates a converter over the conversions currently in `registry`.
    #[must_use]
    pub fn new(registry: &ConversionRegistry) -> Self {
        Self {
            edges: registry.snapshot(),
        }
    }

    /// Converts `value` to `target`.
    ///
    /// An absent value converts to an absent value.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoConversionPath`] if neither a one-hop nor a
    /// two-hop conversion exists, or the error of a conversion that failed.
    pub fn convert(&self, target: Shape, value: Option<Value>) -> PipelineResult<Option<Value>> {
        let Some(value) = value else {
            return Ok(None);
        };

        if let Some(converted) = self.convert_one_hop(target, &value)? {
            return Ok(Some(converted));
        }

        if let Some(converted) = self.convert_multi_hop(target, &value)? {
            return Ok(Some(converted));
        }

        Err(PipelineError::no_conversion_path(
            value.type_name(),
            target.name(),
        ))
    }

    fn convert_one_hop(&self, target: Shape, value: &Value) -> PipelineResult<Option<Value>> {
        if let Some(same) = value.view(target) {
            return Ok(Some(same));
        }

        if let Some(bound) = value.bind_entry_point(target) {
            trace!(source = %value.shape(), target = %target, "bound entry point");
            return Ok(Some(bound));
        }

        for edge in &self.edges {
            if value.satisfies(edge.input()) && target.accepts(edge.output()) {
                trace!(
                    source = %value.shape(),
                    target = %target,
                    "applied registered conversion"
                );
                return edge.apply(value.clone()).map(Some);
            }
        }

        Ok(None)
    }

    fn convert_multi_hop(&self, target: Shape, value: &Value) -> PipelineResult<Option<Value>> {
        for edge in &self.edges {
            let Some(pre) = self.convert_one_hop(edge.input(), value)? else {
                continue;
            };
            let intermediate = edge.apply(pre)?;
            if let Some(post) = self.convert_one_hop(target, &intermediate)? {
                trace!(
                    source = %value.shape(),
                    via = %edge.output(),
                    target = %target,
                    "converted through intermediate shape"
                );
                return Ok(Some(post));
            }
        }

        Ok(None)
    }
}
