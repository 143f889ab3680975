//! # weft
//!
//! **Compose middleware of mixed calling conventions into one request pipeline**
//!
//! weft lets independently authored middleware be mixed in one pipeline even
//! when each was written in a different style:
//!
//! - **Plain callables** – a function from the next stage to this stage
//! - **Init/invoke objects** – initialized with the next stage, then invoked
//! - **Generators** – objects that produce a new stage from the next stage
//! - **Constructible types** – built from the next stage plus extra arguments
//!
//! Registration classifies each middleware once; composition folds the
//! entries around a terminal, converting between stage shapes with registered
//! conversions where needed.
//!
//! ## Quick Start
//!
//! ```
//! use weft::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PipelineError> {
//! let app = PipelineBuilder::new(ShutdownSignal::never())
//!     .use_fn(|next: AppFunc| -> AppFunc {
//!         app_func(move |env: Environment| {
//!             tracing::info!(path = ?env.request_path(), "request");
//!             next(env)
//!         })
//!     })?
//!     .build_app()?;
//!
//! let env = Environment::new();
//! app(env.clone()).await;
//! assert_eq!(env.response_status(), Some(http::StatusCode::NOT_FOUND));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! ```text
//! weft-core        shapes, values, operations, errors, terminal contract
//! weft-middleware  conversions, resolver, builder, http bridge
//! ```

#![doc(html_root_url = "https://docs.rs/weft/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use weft_core as core;

// Re-export composition types
pub use weft_middleware as middleware;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use weft::prelude::*;
///
/// let builder = PipelineBuilder::default();
/// assert!(builder.is_empty());
/// ```
pub mod prelude {
    pub use weft_core::{
        app_func, not_found, AppFunc, Arg, BoxFuture, EntryPoint, Environment, Invoke,
        PipelineError, PipelineResult, Shape, Value,
    };

    pub use weft_middleware::{
        Component, Construct, Generate, Initialize, Middleware, PipelineBuilder, Properties,
        ShutdownSignal, ShutdownTrigger, TypeDescriptor,
    };

    pub use weft_middleware::host::{serve_request, Request, Response};
}
