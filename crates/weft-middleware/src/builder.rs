//! The pipeline builder.
//!
//! A [`PipelineBuilder`] collects middleware in registration order and folds
//! it into a single callable on demand.
//!
//! ## Composition
//!
//! ```text
//! register(A) → register(B) → register(C) → build()
//!
//!   current = terminal
//!   current = C(convert(current))      // last registered, innermost
//!   current = B(convert(current))
//!   current = A(convert(current))      // first registered, outermost
//!   convert(current) → target shape
//! ```
//!
//! Requests therefore flow A → B → C → terminal: registration order is
//! execution order.
//!
//! ## Example
//!
//! ```
//! use http::StatusCode;
//! use weft_core::{app_func, AppFunc, Environment};
//! use weft_middleware::{PipelineBuilder, ShutdownSignal};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), weft_core::PipelineError> {
//! let app = PipelineBuilder::new(ShutdownSignal::never())
//!     .use_fn(|next: AppFunc| -> AppFunc {
//!         app_func(move |env: Environment| {
//!             env.set_response_header("X-Served-By", "weft");
//!             next(env)
//!         })
//!     })?
//!     .build_app()?;
//!
//! let env = Environment::new();
//! app(env.clone()).await;
//! assert_eq!(env.response_status(), Some(StatusCode::NOT_FOUND));
//! assert_eq!(env.response_header("x-served-by").as_deref(), Some("weft"));
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::fmt;

use tracing::{debug, info};
use weft_core::{
    not_found, AppFunc, Arg, Argument, Operation, PipelineError, PipelineResult, Shape, Value,
};

use crate::component::Middleware;
use crate::conversion::ConversionRegistry;
use crate::convert::Converter;
use crate::properties::{Properties, SharedProperties, ShutdownSignal};
use crate::resolver::{resolve, MiddlewareEntry};

/// Builds a request pipeline from middleware of any supported style.
#[derive(Clone)]
pub struct PipelineBuilder {
    properties: SharedProperties,
    conversions: ConversionRegistry,
    entries: Vec<MiddlewareEntry>,
}

impl PipelineBuilder {
    /// Creates an empty builder carrying `shutdown`.
    #[must_use]
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self::with_properties(Properties::new(shutdown))
    }

    /// Creates an empty builder with explicit properties.
    #[must_use]
    pub fn with_properties(properties: impl Into<SharedProperties>) -> Self {
        Self {
            properties: properties.into(),
            conversions: ConversionRegistry::new(),
            entries: Vec::new(),
        }
    }

    /// Registers a middleware with its extra arguments.
    ///
    /// # Errors
    ///
    /// Fails if the middleware cannot be classified; see
    /// [`resolve`](crate::resolve).
    pub fn register(
        self,
        middleware: impl Into<Middleware>,
        args: Vec<Arg>,
    ) -> PipelineResult<Self> {
        self.register_optional(Some(middleware.into()), args)
    }

    /// Registers a middleware that may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingMiddleware`] if `middleware` is `None`,
    /// and the classification errors of [`register`](Self::register)
    /// otherwise.
    pub fn register_optional(
        mut self,
        middleware: Option<Middleware>,
        args: Vec<Arg>,
    ) -> PipelineResult<Self> {
        let entry = resolve(middleware, args)?;
        self.entries.push(entry);
        Ok(self)
    }

    /// Registers a plain callable middleware.
    ///
    /// # Errors
    ///
    /// Never fails for a callable; the result keeps the chain uniform with
    /// [`register`](Self::register).
    pub fn use_fn<N, P, F>(self, f: F) -> PipelineResult<Self>
    where
        N: Argument,
        P: Any + Send + Sync,
        F: Fn(N) -> P + Send + Sync + 'static,
    {
        self.register(Middleware::from_fn(f), Vec::new())
    }

    /// Composes the pipeline and converts it to `target`.
    ///
    /// Returns `None` only if every stage, including the terminal, was absent.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoConversionPath`] if a stage cannot be
    /// converted to the shape the stage before it requires, or the error of a
    /// middleware adapter.
    pub fn build_value(&self, target: Shape) -> PipelineResult<Option<Value>> {
        let mut current = Some(
            self.properties
                .default_terminal()
                .unwrap_or_else(|| Value::new(not_found())),
        );

        for entry in self.entries.iter().rev() {
            current = self.convert(entry.required_next(), current)?;
            let produced = entry.apply(current)?;
            current = self.convert(entry.required_next(), Some(produced))?;
        }

        let composed = self.convert(target, current)?;
        info!(
            entries = self.entries.len(),
            target = %target,
            "composed pipeline"
        );
        Ok(composed)
    }

    /// Composes the pipeline as a typed callable.
    ///
    /// # Errors
    ///
    /// Fails as [`build_value`](Self::build_value) does, and with
    /// [`PipelineError::NoConversionPath`] if the composed value is absent or
    /// not an `S`.
    pub fn build<S: Argument>(&self) -> PipelineResult<S> {
        let target = S::param().shape();
        let composed = self.build_value(target)?;
        let type_name = composed.as_ref().map_or("absent", Value::type_name);
        S::extract(&Arg::from(composed))
            .ok_or_else(|| PipelineError::no_conversion_path(type_name, target.name()))
    }

    /// Composes the pipeline as an [`AppFunc`].
    ///
    /// # Errors
    ///
    /// Fails as [`build`](Self::build) does.
    pub fn build_app(&self) -> PipelineResult<AppFunc> {
        self.build::<AppFunc>()
    }

    /// Creates a builder that shares this builder's properties but starts with
    /// no entries and an empty conversion registry.
    #[must_use]
    pub fn derive(&self) -> Self {
        debug!(entries = self.entries.len(), "derived pipeline builder");
        Self {
            properties: self.properties.clone(),
            conversions: ConversionRegistry::new(),
            entries: Vec::new(),
        }
    }

    /// The shared properties.
    #[must_use]
    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    /// The ambient shutdown signal.
    #[must_use]
    pub fn shutdown(&self) -> ShutdownSignal {
        self.properties.shutdown()
    }

    /// A handle to this builder's conversion registry.
    ///
    /// The handle stays connected to the builder; conversions registered
    /// through it are visible to every later composition. Pass it as
    /// `Arg::new(builder.conversions())` to middleware that declares a
    /// [`ConversionRegistry`] parameter.
    #[must_use]
    pub fn conversions(&self) -> ConversionRegistry {
        self.conversions.clone()
    }

    /// Registers a conversion operation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if `conversion` is absent or
    /// not unary.
    pub fn add_conversion(self, conversion: Option<Operation>) -> PipelineResult<Self> {
        self.conversions.register(conversion)?;
        Ok(self)
    }

    /// Registers a typed conversion from `I` to `O`.
    #[must_use]
    pub fn add_conversion_fn<I, O, F>(self, f: F) -> Self
    where
        I: Argument,
        O: Any + Send + Sync,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        self.conversions.add(f);
        self
    }

    /// The registered entries, in registration order.
    #[must_use]
    pub fn entries(&self) -> &[MiddlewareEntry] {
        &self.entries
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Adapters may register conversions while composition runs, so each call
    // sees the registry as it is now.
    fn convert(&self, target: Shape, value: Option<Value>) -> PipelineResult<Option<Value>> {
        Converter::new(&self.conversions).convert(target, value)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new(ShutdownSignal::never())
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("entries", &self.entries)
            .field("conversions", &self.conversions)
            .finish_non_exhaustive()
    }
}
